//! Command implementations.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use retrace_ai::template;
use retrace_core::SemanticAction;
use retrace_extract::{Extractor, RecordingParser, Tolerance, identify_variables};

use crate::cli::{OutputFormat, ToleranceArg};

impl From<ToleranceArg> for Tolerance {
    fn from(arg: ToleranceArg) -> Self {
        match arg {
            ToleranceArg::Low => Tolerance::Low,
            ToleranceArg::Medium => Tolerance::Medium,
            ToleranceArg::High => Tolerance::High,
        }
    }
}

fn parse_recording(file: &Path) -> Result<RecordingParser> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("failed to read recording {}", file.display()))?;

    let mut parser = RecordingParser::new();
    let is_proto = file
        .extension()
        .map(|extension| extension.eq_ignore_ascii_case("bin"))
        .unwrap_or(false);
    if is_proto {
        parser.parse_proto(&bytes)?;
    } else {
        parser.parse_json(&bytes)?;
    }
    Ok(parser)
}

pub async fn inspect(
    file: &Path,
    tolerance: ToleranceArg,
    with_params: bool,
    format: OutputFormat,
) -> Result<()> {
    let parser = parse_recording(file)?;
    let start_url = parser.start_url().unwrap_or_default();
    let event_count = parser.events().len();

    let mut extractor = Extractor::new(tolerance.into());
    let actions = extractor.extract(parser.events());

    let parameters = if with_params {
        identify_variables(&actions, None).await
    } else {
        Vec::new()
    };

    if format.is_json() {
        let payload = json!({
            "start_url": start_url,
            "event_count": event_count,
            "actions": actions,
            "parameters": parameters,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("Recording: {}", file.display());
    println!("Start URL: {}", start_url);
    println!("Events:    {}", event_count);
    println!("Actions:   {}", actions.len());
    println!("---");
    for action in &actions {
        print_action(action);
    }

    if with_params {
        println!("---");
        println!("Parameters: {}", parameters.len());
        for parameter in &parameters {
            println!(
                "  {} ({:?}) = {:?}  [action {}]",
                parameter.name,
                parameter.parameter_type,
                parameter.default_value,
                parameter.source_action
            );
        }
    }

    Ok(())
}

fn print_action(action: &SemanticAction) {
    let mut line = format!(
        "{:>3}. {:<11} [{:?}]",
        action.sequence_id,
        action.action_type.as_str(),
        action.interaction_rank
    );
    if !action.target.selector.is_empty() {
        line.push_str(&format!("  {}", action.target.selector));
    }
    if !action.value.is_empty() {
        line.push_str(&format!("  = {:?}", action.value));
    }
    println!("{}", line);
}

pub async fn codegen(file: &Path, tolerance: ToleranceArg, format: OutputFormat) -> Result<()> {
    let parser = parse_recording(file)?;

    let mut extractor = Extractor::new(tolerance.into());
    let actions = extractor.extract(parser.events());

    let parameters = identify_variables(&actions, None).await;
    let bindings: HashMap<String, String> = parameters
        .iter()
        .map(|parameter| (parameter.name.clone(), parameter.default_value.clone()))
        .collect();

    if format.is_json() {
        let blocks: Vec<_> = actions
            .iter()
            .map(|action| {
                json!({
                    "sequence_id": action.sequence_id,
                    "code": template::generate_action_code(action, &bindings),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&blocks)?);
        return Ok(());
    }

    for action in &actions {
        print!("{}", template::generate_action_code(action, &bindings));
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_recording(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("recording.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            br#"[
                {"source":"rrweb","timestamp":1,"type":4,"data":{"href":"https://x.test/"}},
                {"source":"custom","timestamp":2,"type":"input","value":"cats and dogs","target":{"tag":"input","selector":"input[name='q']"}}
            ]"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn recordings_parse_by_extension() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_recording(temp_dir.path());
        let parser = parse_recording(&path).unwrap();
        assert_eq!(parser.events().len(), 2);
        assert_eq!(parser.start_url().as_deref(), Some("https://x.test/"));
    }

    #[tokio::test]
    async fn inspect_and_codegen_run_end_to_end() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_recording(temp_dir.path());

        inspect(&path, ToleranceArg::Medium, true, OutputFormat::Json)
            .await
            .unwrap();
        codegen(&path, ToleranceArg::Medium, OutputFormat::Text)
            .await
            .unwrap();
    }
}
