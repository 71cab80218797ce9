//! Role instructions for the tool-augmented path and the plain fallback path

use crate::models::AgentRole;

const RESEARCHER_SYSTEM: &str = "You are a senior technical researcher. Gather comprehensive information about the user's query.
- Extract key claims with sources
- Compare technologies objectively
- Include recent developments
- Format claims as bullet points starting with '- '

Use the available tools to research thoroughly. If tools are not available, use your knowledge.";

const CRITIC_SYSTEM: &str = "You are a quality assurance expert. The user will provide research content to analyze.
- Verify factual accuracy using available tools when possible
- Identify unsupported claims
- Check for bias or staleness
- Flag any contradictions
- Format feedback as bullet points";

const SYNTHESIZER_SYSTEM: &str = "You are a technical writer. The user will provide research and critique content to synthesize.
- Create structured comparison tables
- Highlight verified vs contested claims
- Provide clear recommendations
- Include sources
- Use markdown formatting";

pub fn system_prompt(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Researcher => RESEARCHER_SYSTEM,
        AgentRole::Critic => CRITIC_SYSTEM,
        AgentRole::Synthesizer => SYNTHESIZER_SYSTEM,
    }
}

/// Single-message prompt for the no-tools path
pub fn fallback_prompt(role: AgentRole, input: &str) -> String {
    match role {
        AgentRole::Researcher => format!(
            "As a technical researcher, analyze this query and provide comprehensive information:\n\n\
             Query: {}\n\n\
             Please provide:\n\
             - Key technical details and comparisons\n\
             - Recent developments and trends\n\
             - Practical recommendations\n\
             - Format as bullet points where appropriate\n\n\
             Response:",
            input
        ),
        AgentRole::Critic => format!(
            "As a quality assurance expert, analyze this research content:\n\n\
             Content: {}\n\n\
             Please provide:\n\
             - Assessment of factual accuracy\n\
             - Identification of unsupported claims\n\
             - Bias or outdated information detection\n\
             - Contradictions or inconsistencies\n\
             - Format as bullet points\n\n\
             Analysis:",
            input
        ),
        AgentRole::Synthesizer => format!(
            "As a technical writer, synthesize this research and critique:\n\n\
             Content: {}\n\n\
             Please provide:\n\
             - Structured summary with comparison tables\n\
             - Clear recommendations\n\
             - Source attribution\n\
             - Markdown formatting\n\n\
             Final Report:",
            input
        ),
    }
}
