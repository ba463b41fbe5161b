//! Fixed replies sent back to the customer when the agent cannot answer.

/// Sent when the inbound message is empty or whitespace only.
pub const INVALID_MESSAGE: &str = "Por favor, envie uma mensagem válida.";

/// Sent when the agent call fails.
pub const AGENT_FAILURE: &str =
    "Desculpe, ocorreu um erro ao processar sua solicitação. Por favor, tente novamente mais tarde.";

/// Sent when the agent finished without producing any text.
pub const NO_OUTPUT: &str = "Desculpe, não consegui processar sua solicitação.";
