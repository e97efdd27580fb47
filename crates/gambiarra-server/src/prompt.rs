//! System-prompt assembly.
//!
//! The wording is not an invariant anywhere; tests never assert on it.

use std::fmt::Write;

use gambiarra_core::SessionConfig;
use gambiarra_tools::{ModeFilter, ToolRegistry};

/// Build the system prompt for a session.
#[must_use]
pub fn build_system_prompt(config: &SessionConfig, registry: &ToolRegistry) -> String {
    let filter = ModeFilter::new();
    let allowed = filter.allowed_tools(config.operating_mode);

    let mut prompt = format!(
        "You are Gambiarra, a coding assistant operating in {} mode on the workspace at {}. {}\n\n\
         You act by emitting XML tool calls in your response. Each call is one element named \
         by the tool, wrapping an <args> element with one child per parameter. Example:\n\
         <list_files><args><path>.</path><recursive>false</recursive></args></list_files>\n\
         The read_file tool nests its path: \
         <read_file><args><file><path>src/main.rs</path></file></args></read_file>\n\n\
         Available tools:\n",
        config.operating_mode,
        config.working_directory.display(),
        config.operating_mode.description(),
    );

    for def in registry.definitions() {
        if !allowed.contains(def.name) {
            continue;
        }
        let params: Vec<&str> = def.parameters.iter().map(|p| p.name).collect();
        let _ = writeln!(
            prompt,
            "- {}: {} (parameters: {})",
            def.name,
            def.description,
            params.join(", ")
        );
    }

    prompt.push_str(
        "\nUse one tool at a time and wait for its result. When the task is done, emit \
         attempt_completion with a summary of what was accomplished.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambiarra_core::OperatingMode;

    #[test]
    fn test_prompt_lists_only_mode_allowed_tools() {
        let registry = ToolRegistry::with_defaults();
        let config = SessionConfig::new("/w").with_mode(OperatingMode::Review);
        let prompt = build_system_prompt(&config, &registry);

        assert!(prompt.contains("- read_file:"));
        assert!(!prompt.contains("- write_to_file:"));
        assert!(!prompt.contains("- execute_command:"));
    }

    #[test]
    fn test_code_mode_lists_everything() {
        let registry = ToolRegistry::with_defaults();
        let config = SessionConfig::new("/w");
        let prompt = build_system_prompt(&config, &registry);
        for name in registry.names() {
            assert!(prompt.contains(&format!("- {name}:")), "{name} missing");
        }
    }
}
