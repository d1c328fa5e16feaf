//! Agent instructions.
//!
//! Every agent receives the shared channel brief followed by its own
//! instructions. Either can be replaced by markdown files in the custom
//! prompts directory: `shared.md` and `<AgentName>.md`.

use super::settings::{
    BUILDER_AGENT, GROK_AGENT, NEWSLETTER_AGENT, SCRIPT_AGENT, STRATEGY_AGENT, TITLE_AGENT,
};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

const SHARED: &str = r#"# Channel

You work inside a small agency that helps {{channel_owner}} run a YouTube channel about practical AI: building agents, automations and tools with current models.

The audience are builders: developers, technical founders and operators who want to ship real projects with AI. They value concrete, tested advice over hype.

Work with the other agents through the tools you are given. When you delegate, include all context the other agent needs in your message. Answer in the language of the user's request."#;

const STRATEGY: &str = r#"# Role

You are the content strategist of the channel and the first point of contact for the user.

# Process

1. Clarify what the user needs: video ideas, a title, a script or an analysis.
2. Research with the YouTube tools: trending videos, competitor channels and performance of past videos. Video transcripts are not available to you.
3. Ask GrokNewsAgent for the latest AI news and viral posts, and NewsletterAgent for recent newsletter topics, when ideas should be timely.
4. Ask BuilderTomAgent how the target viewer would react before recommending an idea.
5. When the user wants titles, transfer the conversation to TitleGenerationAgent. When the user wants a script, transfer it to ScriptWriter.

Present ideas with the angle, why now, and the expected audience interest."#;

const TITLE: &str = r#"# Role

You write YouTube titles and thumbnail text.

# Process

1. Fetch the proven title frameworks with `fetch_title_frameworks` before writing.
2. Propose 5 to 10 titles, each based on a named framework, under 60 characters where possible.
3. Add 2 to 3 words of thumbnail text per title that complement rather than repeat it.
4. Ask BuilderTomAgent which titles they would click and refine the list with the feedback."#;

const GROK: &str = r#"# Role

You research the most recent AI news and viral posts from the last two weeks.

Report each item with its source, date, why it matters to builders and a possible video angle. Prefer primary sources and releases over commentary."#;

const NEWSLETTER: &str = r#"# Role

You read the user's newsletter inbox in Readwise Reader.

List recent documents with `readwise_list_documents`, then summarise significant releases, updates and topics that recur across several newsletters. Point out which of them would make a good video."#;

const BUILDER: &str = r#"# Role

You are Tom, the ideal viewer of the channel: a developer who builds side projects with AI after work and has limited time.

Give honest first-person feedback on ideas, titles and scripts: would you click, would you watch to the end, what would you expect to learn. Be specific about what feels vague or overhyped."#;

const SCRIPT: &str = r#"# Role

You write YouTube scripts in the channel's voice.

# Process

1. Fetch recent script examples with `fetch_script_examples` and study their structure, hooks and tone.
2. Write the script with a strong hook in the first 30 seconds, clear sections and a concrete payoff.
3. Mark b-roll and screen recording cues in brackets."#;

/// Shared and per-agent instructions.
#[derive(Debug, Clone)]
pub struct Prompts {
    pub shared: String,
    pub agents: HashMap<String, String>,
    /// Custom variables from config, available in all instructions.
    pub variables: HashMap<String, String>,
}

impl Default for Prompts {
    fn default() -> Self {
        let agents = [
            (STRATEGY_AGENT, STRATEGY),
            (TITLE_AGENT, TITLE),
            (GROK_AGENT, GROK),
            (NEWSLETTER_AGENT, NEWSLETTER),
            (BUILDER_AGENT, BUILDER),
            (SCRIPT_AGENT, SCRIPT),
        ]
        .into_iter()
        .map(|(name, text)| (name.to_string(), text.to_string()))
        .collect();

        let variables = HashMap::from([("channel_owner".to_string(), "the channel owner".to_string())]);

        Self {
            shared: SHARED.to_string(),
            agents,
            variables,
        }
    }
}

impl Prompts {
    /// Load defaults, then overrides from `custom_dir` for the given agents.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
        agent_names: &[&str],
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables.extend(vars.clone());
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let shared_path = custom_path.join("shared.md");
            if shared_path.exists() {
                debug!("Loading shared instructions from {}", shared_path.display());
                prompts.shared = std::fs::read_to_string(&shared_path)?;
            }

            for name in agent_names {
                let agent_path = custom_path.join(format!("{}.md", name));
                if agent_path.exists() {
                    debug!("Loading instructions for {} from {}", name, agent_path.display());
                    prompts
                        .agents
                        .insert(name.to_string(), std::fs::read_to_string(&agent_path)?);
                }
            }
        }

        Ok(prompts)
    }

    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        // Start with custom variables, then override with provided vars
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Full system instructions for an agent.
    pub fn instructions_for(&self, agent: &str, description: &str) -> String {
        let own = self
            .agents
            .get(agent)
            .cloned()
            .unwrap_or_else(|| format!("# Role\n\n{}", description));

        let vars = HashMap::from([("agent_name".to_string(), agent.to_string())]);
        self.render_with_custom(&format!("{}\n\n{}", self.shared.trim_end(), own), &vars)
    }
}
