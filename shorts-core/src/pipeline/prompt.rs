use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Operator interaction used by the pipeline: progress lines, a yes/no
/// confirmation and a numbered choice.
#[async_trait]
pub trait Prompter: Send + Sync {
    fn say(&self, line: &str);
    async fn confirm(&self, question: &str) -> bool;
    /// Returns the 0-based index of the chosen option, or `None` for an
    /// invalid answer.
    async fn choose(&self, question: &str, options: &[String]) -> Option<usize>;
}

/// Parses a 1-based menu answer.
pub fn parse_choice(answer: &str, options: usize) -> Option<usize> {
    let number: usize = answer.trim().parse().ok()?;
    (1..=options).contains(&number).then(|| number - 1)
}

pub fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

type OperatorInput = Lines<Box<dyn AsyncBufRead + Send + Unpin>>;

/// Prompts on stdout and reads answers line by line from one shared reader,
/// so piped answers survive across questions.
pub struct StdioPrompter {
    input: Mutex<OperatorInput>,
}

impl StdioPrompter {
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }

    pub fn from_reader(reader: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(reader);
        Self {
            input: Mutex::new(reader.lines()),
        }
    }

    async fn ask(&self, question: &str) -> Option<String> {
        let mut stdout = tokio::io::stdout();
        if stdout.write_all(question.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return None;
        }
        match self.input.lock().await.next_line().await {
            Ok(line) => line,
            Err(err) => {
                warn!(target: "pipeline", error = %err, "cannot read operator input");
                None
            }
        }
    }
}

impl Default for StdioPrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompter for StdioPrompter {
    fn say(&self, line: &str) {
        println!("{line}");
    }

    async fn confirm(&self, question: &str) -> bool {
        self.ask(&format!("{question} (y/N): "))
            .await
            .map(|answer| is_yes(&answer))
            .unwrap_or(false)
    }

    async fn choose(&self, question: &str, options: &[String]) -> Option<usize> {
        println!();
        for (index, option) in options.iter().enumerate() {
            println!("  {}. {option}", index + 1);
        }
        let answer = self
            .ask(&format!("\n{question} (1-{}): ", options.len()))
            .await?;
        parse_choice(&answer, options.len())
    }
}

/// Non-interactive operator: accepts every checkpoint and picks the first
/// option.
#[derive(Debug, Default)]
pub struct AutoPrompter;

#[async_trait]
impl Prompter for AutoPrompter {
    fn say(&self, line: &str) {
        info!(target: "pipeline", "{line}");
    }

    async fn confirm(&self, _question: &str) -> bool {
        true
    }

    async fn choose(&self, _question: &str, options: &[String]) -> Option<usize> {
        (!options.is_empty()).then_some(0)
    }
}
