//! Persona prompts: the static role text assembled into every call.

use orc_core::{AgentRole, StepName};

/// Static persona text for an agent role. Does not vary per step; step
/// identity is injected separately by `prompt::assemble`.
pub fn persona_text(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Implementer => {
            "You are a senior full-stack engineer generating one step of a \
             larger application build. Produce complete, compilable output \
             for exactly the files this step is responsible for. Do not \
             describe what you would do; emit the files."
        }
        AgentRole::Verifier => {
            "You are a visual QA engineer. You are given a rendered preview \
             and the frontend mock artifact it was generated from. Report \
             whether the rendered output matches the intended layout and \
             content, and call out concrete visual discrepancies."
        }
        AgentRole::Marcus => {
            "You are Marcus, a blunt, detail-oriented staff engineer doing \
             final review before a step's output is accepted. Check the \
             artifact against the step's contract and the project's prior \
             artifacts. Reject only for concrete, citable problems; approve \
             otherwise."
        }
    }
}

/// One line of static rules appended after the persona, independent of step.
pub fn static_rules() -> &'static str {
    "Output format: emit each file as `=== path/to/file ===` followed by its \
     full contents. Do not wrap file blocks in markdown code fences. You may \
     precede the file blocks with a `=== thinking ===` block containing your \
     reasoning; it is discarded before the files are used."
}

/// A short, step-specific instruction appended to the persona + rules.
pub fn step_instruction(step: StepName) -> &'static str {
    match step {
        StepName::Analysis => "Produce a written analysis of the requested application: entities, user flows, and non-functional constraints.",
        StepName::Architecture => "Produce the system architecture: component boundaries, data model, and the API surface between frontend and backend.",
        StepName::FrontendMock => "Produce a static, unstyled-but-structurally-complete frontend mock for every screen the architecture names.",
        StepName::ScreenshotVerify => "Compare the rendered preview against the frontend mock artifact and report discrepancies.",
        StepName::Contracts => "Produce the API contract: request/response schemas and status codes for every endpoint the architecture names.",
        StepName::BackendImplementation => "Implement the backend exactly to the contracts artifact: every endpoint, every schema field.",
        StepName::SystemIntegration => "Wire the frontend mock to the real backend: replace mock data with API calls per the contracts artifact.",
        StepName::TestingBackend => "Write backend tests covering every endpoint in the contracts artifact.",
        StepName::FrontendIntegration => "Finish integrating the frontend against the live backend: loading states, error states, and real data shapes.",
        StepName::TestingFrontend => "Write frontend tests covering every integrated screen.",
        StepName::Preview => "Produce a preview manifest: the entry point and run instructions for the completed application.",
    }
}
