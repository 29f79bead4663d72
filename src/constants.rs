// User-facing text and defaults for the chat client.

/// Placeholder answer shown while an exchange is pending.
pub const PENDING_PLACEHOLDER: &str = "...";

/// Fixed user-facing message for any failed request.
pub const REQUEST_ERROR_MESSAGE: &str = "Erro ao obter resposta. Tente novamente.";

pub const LOADING_MESSAGE: &str = "Gerando resposta...";

pub const EMPTY_TRANSCRIPT_MESSAGE: &str =
    "Nenhuma interação ainda. Faça uma pergunta e tire suas dúvidas sobre sua gestação!";

pub const INPUT_PLACEHOLDER: &str = "Faça uma pergunta relacionado à gestação...";

pub const ASK_QUESTION_PATH: &str = "ask_question";

/// Used when neither `--api-url`, `GRAVID_API_URL` nor a .env file sets one.
pub const DEFAULT_API_URL: &str = "https://gravidai.onrender.com";

/// Seconds the decorative countdown starts from.
pub const DEFAULT_COUNTDOWN_START: u32 = 20;

// The free-tier host cold-starts slowly; keep this well above the countdown.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
