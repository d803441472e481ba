pub mod context;
pub mod markdown;
pub mod prompt;
pub mod session;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use context::StudentContext;
use crossterm::style::Stylize;
use crossterm::{cursor, execute, terminal};
use eyre::Result;
use session::{ChatMessage, ChatSession, Role};
use tracing::{debug, error};

use crate::backend_client::BackendClient;
use crate::inference_client::InferenceApi;

const WELCOME_TEXT: &str = color_print::cstr!(
    "
<bold>UniChat</bold> — seu assistente acadêmico inteligente.

/help         Mostra esta ajuda
/clear        Reinicia a conversa
/history      Mostra as conversas salvas
/quit         Sai do aplicativo
"
);

const HELP_TEXT: &str = color_print::cstr!(
    "
<bold>UniChat</bold>

/help         Mostra esta ajuda
/clear        Reinicia a conversa
/history      Mostra as conversas salvas no backend
/quit         Sai do aplicativo

Qualquer outro texto é enviado como pergunta ao assistente.
"
);

/// Shown in place of an answer when the inference call fails. A failed turn
/// is terminal; the user asks again if they want a retry.
const FALLBACK_ANSWER: &str =
    "Desculpe, tive um problema ao processar sua pergunta. Poderia tentar novamente?";

/// Owns the message log and the request lifecycle for one chat session.
///
/// One turn at a time: `send_message` rejects input while a request is in
/// flight. The persistence write after a successful turn is detached and
/// best-effort; it never blocks the next send and never surfaces errors.
pub struct ChatContext {
    output: Box<dyn Write + Send>,
    input: Option<String>,
    interactive: bool,
    session: ChatSession,
    student: StudentContext,
    inference: Arc<dyn InferenceApi>,
    backend: Arc<BackendClient>,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write + Send>,
        input: Option<String>,
        interactive: bool,
        student: StudentContext,
        inference: Arc<dyn InferenceApi>,
        backend: Arc<BackendClient>,
    ) -> Self {
        let session = ChatSession::new(&student.name);

        Self {
            output,
            input,
            interactive,
            session,
            student,
            inference,
            backend,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        // Best-effort refresh of the display name; the configured identity
        // stands when the backend is unreachable.
        match self.backend.student_details(self.student.id).await {
            Ok(details) => {
                debug!("Loaded student record for {}", details.nome);
                self.student.name = details.nome;
            }
            Err(e) => debug!("Student details unavailable, keeping configured name: {}", e),
        }
        self.session = ChatSession::new(&self.student.name);

        if self.interactive {
            self.print_welcome()?;
        }

        let greeting = self.session.messages()[0].clone();
        self.render_message(&greeting)?;

        // Non-interactive mode: a single question, then exit.
        if let Some(input) = self.input.take() {
            self.send_message(&input).await?;
            return Ok(ExitCode::SUCCESS);
        }

        if self.interactive {
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            let prompt_text = prompt::generate_prompt(None);
            let readline = rl.readline(&prompt_text);

            match readline {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if line.trim() == "/quit" {
                        break;
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        writeln!(self.output, "Erro: {}", e)?;
                    }
                }
                Err(e) => {
                    writeln!(self.output, "Erro: {}", e)?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<()> {
        match input.trim() {
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                self.session = ChatSession::new(&self.student.name);
                writeln!(self.output, "Conversa reiniciada.")?;
                let greeting = self.session.messages()[0].clone();
                self.render_message(&greeting)?;
            }
            "/history" => {
                self.show_history().await?;
            }
            _ => {
                self.send_message(input).await?;
            }
        }

        Ok(())
    }

    /// One chat turn: append the user message, call the inference service,
    /// append the answer (or the fixed fallback) and dispatch the detached
    /// history write. Empty input and sends while a request is outstanding
    /// are rejected outright, not queued.
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() || self.session.is_awaiting() {
            return Ok(());
        }

        let user_message = self.session.push_user(text).clone();
        self.session.begin_turn();
        self.render_message(&user_message)?;
        self.show_typing()?;

        let reply = self.inference.ask(text, self.student.id).await;
        self.clear_typing()?;

        match reply {
            Ok(response) => {
                let assistant = self.session.push_assistant(&response.answer).clone();

                let backend = Arc::clone(&self.backend);
                let student_id = self.student.id;
                let question = text.to_string();
                let answer = response.answer;
                // Detached write: no ordering guarantee relative to later
                // turns, no retry, failures logged inside the client.
                tokio::spawn(async move {
                    let _ = backend.persist_message(student_id, &question, &answer).await;
                });

                self.session.end_turn();
                self.render_message(&assistant)?;
            }
            Err(e) => {
                error!("Failed to process question: {}", e);
                self.session.record_error(&e.to_string());
                let fallback = self.session.push_assistant(FALLBACK_ANSWER).clone();
                self.session.end_turn();
                self.render_message(&fallback)?;
            }
        }

        Ok(())
    }

    async fn show_history(&mut self) -> Result<()> {
        match self.backend.history(self.student.id).await {
            Ok(entries) if entries.is_empty() => {
                writeln!(self.output, "Nenhuma conversa salva ainda.")?;
            }
            Ok(entries) => {
                for entry in entries {
                    let time = entry
                        .timestamp
                        .with_timezone(&Local)
                        .format("%d/%m/%Y %H:%M");
                    writeln!(
                        self.output,
                        "{} {}",
                        format!("[{}]", time).dark_grey(),
                        entry.pergunta.as_str().bold()
                    )?;
                    writeln!(self.output, "{}\n", markdown::render(&entry.resposta))?;
                }
            }
            Err(e) => {
                writeln!(self.output, "Não foi possível carregar o histórico: {}", e)?;
            }
        }

        Ok(())
    }

    fn render_message(&mut self, message: &ChatMessage) -> Result<()> {
        let header = match message.role {
            Role::User => "Você".blue().bold(),
            Role::Assistant => "UniChat".green().bold(),
        };
        let time = message.timestamp.with_timezone(&Local).format("%H:%M:%S");

        writeln!(
            self.output,
            "{} {}",
            header,
            format!("({})", time).dark_grey()
        )?;
        writeln!(self.output, "{}\n", markdown::render(&message.content))?;

        Ok(())
    }

    fn show_typing(&mut self) -> Result<()> {
        write!(self.output, "{}", "UniChat está digitando…".dark_grey())?;
        self.output.flush()?;
        Ok(())
    }

    fn clear_typing(&mut self) -> Result<()> {
        execute!(
            self.output,
            cursor::MoveToColumn(0),
            terminal::Clear(terminal::ClearType::CurrentLine)
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    use reqwest::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::ApiError;
    use crate::inference_client::ApiResponse;

    struct StubInference {
        answer: Option<String>,
    }

    #[async_trait::async_trait]
    impl InferenceApi for StubInference {
        async fn ask(&self, _question: &str, _student_id: i64) -> Result<ApiResponse, ApiError> {
            match &self.answer {
                Some(answer) => Ok(ApiResponse {
                    answer: answer.clone(),
                }),
                None => Err(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR)),
            }
        }
    }

    /// Output writer the tests can read back after the controller moved it.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn test_context_with(
        answer: Option<&str>,
        backend_url: &str,
        output: Box<dyn Write + Send>,
    ) -> ChatContext {
        let student = StudentContext {
            id: 1,
            name: "Aluno Teste".to_string(),
        };
        let backend = Arc::new(BackendClient::with_base_url(backend_url).unwrap());
        let inference: Arc<dyn InferenceApi> = Arc::new(StubInference {
            answer: answer.map(str::to_string),
        });

        ChatContext::new(output, None, false, student, inference, backend)
    }

    // Backend pointed at a closed local port: the history write is
    // best-effort and its failure must stay invisible to the session.
    fn test_context(answer: Option<&str>) -> ChatContext {
        test_context_with(answer, "http://127.0.0.1:9", Box::new(io::sink()))
    }

    #[tokio::test]
    async fn a_turn_appends_user_then_assistant() {
        let mut ctx = test_context(Some("Your GPA is 3.8"));

        ctx.send_message("What is my GPA?").await.unwrap();

        let messages = ctx.session().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::Assistant);
        assert!(messages[0].content.contains("Aluno Teste"));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "What is my GPA?");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, "Your GPA is 3.8");
        assert!(!ctx.session().is_awaiting());
    }

    #[tokio::test]
    async fn empty_or_whitespace_input_is_a_no_op() {
        let mut ctx = test_context(Some("irrelevante"));

        ctx.send_message("").await.unwrap();
        ctx.send_message("   \t ").await.unwrap();

        assert_eq!(ctx.session().messages().len(), 1);
    }

    #[tokio::test]
    async fn sends_are_rejected_while_awaiting() {
        let mut ctx = test_context(Some("irrelevante"));

        ctx.session.begin_turn();
        ctx.send_message("segunda pergunta").await.unwrap();

        assert_eq!(ctx.session().messages().len(), 1);
        assert!(ctx.session().is_awaiting());
    }

    #[tokio::test]
    async fn inference_failure_appends_the_fallback() {
        let mut ctx = test_context(None);

        ctx.send_message("Qual é a minha nota?").await.unwrap();

        let messages = ctx.session().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, FALLBACK_ANSWER);
        assert!(!ctx.session().is_awaiting());
        assert!(ctx.session().last_error().is_some());
    }

    #[tokio::test]
    async fn the_answer_is_stored_verbatim() {
        let mut ctx = test_context(Some("Sua média é **8,5** em `Cálculo I`."));

        ctx.send_message("média?").await.unwrap();

        let messages = ctx.session().messages();
        assert_eq!(messages[2].content, "Sua média é **8,5** em `Cálculo I`.");
    }

    #[tokio::test]
    async fn persistence_failure_never_touches_the_log() {
        let mut ctx = test_context(Some("resposta"));

        ctx.send_message("pergunta").await.unwrap();

        // Give the detached write time to fail against the dead backend.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(ctx.session().messages().len(), 3);
        assert_eq!(ctx.session().messages()[2].content, "resposta");
        assert!(!ctx.session().is_awaiting());
    }

    #[tokio::test]
    async fn a_failed_turn_leaves_the_session_usable() {
        let mut ctx = test_context(None);

        ctx.send_message("primeira").await.unwrap();
        assert_eq!(ctx.session().messages().len(), 3);

        ctx.send_message("segunda").await.unwrap();
        assert_eq!(ctx.session().messages().len(), 5);
        assert!(!ctx.session().is_awaiting());
    }

    #[tokio::test]
    async fn run_greets_with_the_name_from_the_student_record() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/alunos/1/detalhes/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1,
                "nome": "Maria Silva",
                "curso": "Ciência da Computação",
                "semestre": 4,
            })))
            .mount(&server)
            .await;

        let mut ctx = test_context_with(Some("irrelevante"), &server.uri(), Box::new(io::sink()));
        ctx.run().await.unwrap();

        let messages = ctx.session().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
        assert!(messages[0].content.contains("Maria Silva"));
    }

    #[tokio::test]
    async fn run_keeps_the_configured_name_when_the_backend_is_down() {
        let mut ctx = test_context(Some("irrelevante"));
        ctx.run().await.unwrap();

        let messages = ctx.session().messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("Aluno Teste"));
    }

    #[tokio::test]
    async fn clear_resets_the_session_to_a_fresh_greeting() {
        let mut ctx = test_context(Some("resposta"));

        ctx.send_message("pergunta").await.unwrap();
        assert_eq!(ctx.session().messages().len(), 3);

        ctx.handle_input("/clear").await.unwrap();

        let messages = ctx.session().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
        assert!(messages[0].content.contains("Aluno Teste"));
        assert!(!ctx.session().is_awaiting());
    }

    #[tokio::test]
    async fn history_command_renders_the_saved_turns() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/chat-historico/por_aluno/"))
            .and(query_param("aluno_id", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 1,
                "aluno": 1,
                "pergunta": "Qual é o meu horário?",
                "resposta": "Cálculo I, segunda-feira às 8h.",
                "timestamp": "2026-03-09T09:30:00Z",
            }])))
            .mount(&server)
            .await;

        let output = SharedBuf::default();
        let mut ctx = test_context_with(None, &server.uri(), Box::new(output.clone()));

        ctx.handle_input("/history").await.unwrap();

        let printed = output.contents();
        assert!(printed.contains("Qual é o meu horário?"));
        assert!(printed.contains("Cálculo I"));
        // Durable history is display-only; the in-memory log stays untouched.
        assert_eq!(ctx.session().messages().len(), 1);
    }

    #[tokio::test]
    async fn history_command_reports_an_empty_history() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/chat-historico/por_aluno/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let output = SharedBuf::default();
        let mut ctx = test_context_with(None, &server.uri(), Box::new(output.clone()));

        ctx.handle_input("/history").await.unwrap();

        assert!(output.contents().contains("Nenhuma conversa salva ainda."));
    }

    #[tokio::test]
    async fn history_command_reports_backend_failures() {
        let output = SharedBuf::default();
        let mut ctx = test_context_with(None, "http://127.0.0.1:9", Box::new(output.clone()));

        ctx.handle_input("/history").await.unwrap();

        assert!(output
            .contents()
            .contains("Não foi possível carregar o histórico"));
        assert_eq!(ctx.session().messages().len(), 1);
    }
}
