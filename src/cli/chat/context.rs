use std::env;

/// Identity of the student this session belongs to. Outgoing requests are
/// tagged with the id; the name only feeds the greeting.
#[derive(Debug, Clone)]
pub struct StudentContext {
    pub id: i64,
    pub name: String,
}

impl StudentContext {
    pub fn from_env() -> Self {
        let id = env::var("UNICHAT_STUDENT_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let name = env::var("UNICHAT_STUDENT_NAME").unwrap_or_else(|_| "Aluno Teste".to_string());

        Self { id, name }
    }
}
