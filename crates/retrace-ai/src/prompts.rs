//! Prompt construction shared by every provider backend.

use retrace_core::{SemanticAction, WorkflowParameter};

use crate::provider::PageContext;

/// System prompt for per-action driver-code generation.
pub const SYSTEM_PROMPT: &str = r#"You are an expert browser-automation engineer. Your task is to
generate robust, production-ready rod-style driver code to execute browser actions.

## CRITICAL RULES FOR CODE GENERATION

### 1. SELECTOR GENERATION PRIORITY (Most Important)
The provided selector may be brittle. Analyze the target attributes and generate a robust selector:

**Priority Order:**
1. **Accessibility Attributes (Best)**: aria-label, aria-placeholder, role
   - Example: input[aria-label='Search Reddit']
2. **Form Attributes (Good)**: name, placeholder, title
   - Example: input[name='q'] or input[placeholder='Search...']
3. **Data Attributes**: data-testid, data-cy, data-* (if stable-looking)
   - Example: button[data-testid='submit-btn']
4. **ID (Only if stable)**: Avoid IDs with mixed letters and numbers
   - Good: #main-search
   - Bad: #search-a7f3d2
5. **Class (Last resort)**: Only use semantic class names
   - Good: .submit-button
   - Bad: .css-1n5ry8e (CSS-in-JS generated)

### 2. WAIT STRATEGIES
Always use appropriate wait strategies:
- Before click: .MustWaitVisible() or .MustWaitStable()
- Before input: .MustWaitVisible()
- After navigation: .MustWaitLoad() or .MustWaitIdle()

### 3. INPUT HANDLING
- Clear existing text before typing: element.MustSelectAllText()
- For search fields: consider pressing Enter after input

### 4. VARIABLE TOKEN HANDLING
When a value is marked as a variable token, use the provided variable name instead of hardcoding:
- Input: searchQuery variable with value "cats"
- Code: element.MustInput(searchQuery) // NOT element.MustInput("cats")

## OUTPUT FORMAT
Return ONLY valid driver code. No markdown, no explanations.
The code should be a single block that can be executed directly:

element := page.MustElement("selector").MustWaitVisible()
element.MustClick()

Or for inputs:

element := page.MustElement("selector").MustWaitVisible()
element.MustSelectAllText().MustInput(variableName)
"#;

/// System prompt for the JSON variable-token analysis.
pub const JSON_SYSTEM_PROMPT: &str =
    "You are a JSON generator. Output ONLY valid JSON, no explanations.";

/// System prompt for the value classifier.
pub const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a semantic classifier. You will be given a \
    text value. You must output a single, short, camelCase string that describes the semantic \
    type of this value. Examples: 'user@example.com' -> 'email', '123 Main St' -> 'address', \
    'search term' -> 'searchQuery'. Output ONLY the class name, nothing else.";

/// Build the prompt for a single action.
pub fn build_action_prompt(
    action: &SemanticAction,
    page: &PageContext,
    retry_count: u32,
    last_error: &str,
) -> String {
    let attributes =
        serde_json::to_string_pretty(&action.target.attributes).unwrap_or_else(|_| "{}".into());

    let retry_section = if retry_count > 0 && !last_error.is_empty() {
        format!(
            "\n**RETRY ATTEMPT {}**\nThe previous attempt failed with error: {}\n\n\
             Please generate alternative code that:\n\
             1. Uses a different selector strategy\n\
             2. Adds additional waits if needed\n\
             3. Considers that the element might be in a different state\n",
            retry_count, last_error
        )
    } else {
        String::new()
    };

    format!(
        "Execute the following browser action:\n\n\
         **Action Type**: {}\n\
         **Sequence**: {}\n\n\
         **Target Element**:\n\
         - Tag: {}\n\
         - Selector: {}\n\
         - Text: {}\n\
         - Attributes: {}\n\n\
         **Value**: {}\n\n\
         **Current Page Context**:\n\
         - URL: {}\n\
         - Title: {}\n\
         {}\n\
         Generate the driver code to execute this action. Remember:\n\
         1. Use the best available selector from the attributes\n\
         2. Include appropriate waits\n\
         3. If this is an input action with a variable value, use the variable name provided\n\
         4. Handle potential edge cases\n",
        action.action_type,
        action.sequence_id,
        action.target.tag,
        action.target.selector,
        action.target.text,
        attributes,
        action.value,
        page.url,
        page.title,
        retry_section,
    )
}

/// Build the variable-token identification prompt.
pub fn build_variable_token_prompt(actions: &[SemanticAction]) -> String {
    let actions_json = serde_json::to_string_pretty(actions).unwrap_or_else(|_| "[]".into());
    format!(
        "Analyze the following browser actions and identify which input values are:\n\
         1. **Variable Tokens**: user-specific data that should be parameterized \
         (e.g., search queries, usernames, passwords)\n\
         2. **Fixed Tokens**: structural inputs that should remain constant \
         (e.g., Enter key, Tab navigation)\n\n\
         For each variable token, provide:\n\
         - A descriptive camelCase parameter name\n\
         - The inferred data type (string, number, email, url)\n\
         - Whether it's required\n\n\
         **Actions to analyze:**\n{}\n\n\
         **Output Format (JSON):**\n\
         {{\n  \"parameters\": [\n    {{\n      \"name\": \"searchQuery\",\n      \
         \"type\": \"string\",\n      \"default_value\": \"original value from recording\",\n      \
         \"description\": \"Brief description\",\n      \"required\": true,\n      \
         \"source_action\": 1\n    }}\n  ]\n}}\n\n\
         Analyze the actions and return the JSON.\n",
        actions_json
    )
}

/// Build the complete-workflow generation prompt.
pub fn build_workflow_prompt(
    actions: &[SemanticAction],
    parameters: &[WorkflowParameter],
) -> String {
    let params_json = serde_json::to_string_pretty(parameters).unwrap_or_else(|_| "[]".into());
    let actions_json = serde_json::to_string_pretty(actions).unwrap_or_else(|_| "[]".into());
    format!(
        "Generate a complete, production-ready function that executes the following browser \
         automation workflow.\n\n\
         **Workflow Parameters:**\n{}\n\n\
         **Semantic Actions:**\n{}\n\n\
         **Requirements:**\n\
         1. Function signature: func ExecuteWorkflow(page *rod.Page, params WorkflowParams) error\n\
         2. Define WorkflowParams struct with all parameters\n\
         3. Include proper error handling with context\n\
         4. Add comments for each major step\n\
         5. Use robust selectors (prioritize aria-label, name, placeholder over dynamic classes)\n\
         6. Include appropriate waits between actions\n\
         7. Return descriptive errors on failure\n\n\
         **Important Notes:**\n\
         - Replace all variable token values with the corresponding parameter\n\
         - Handle navigation between pages correctly\n\
         - Consider race conditions and timing issues\n\n\
         Generate the complete code:\n",
        params_json, actions_json
    )
}

/// Build the classifier user prompt.
pub fn build_classifier_prompt(value: &str) -> String {
    format!("Classify this value: \"{}\"", value)
}
