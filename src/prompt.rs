/// The `PromptBuilder` struct is responsible for constructing summary prompts from article text.
/// It allows adding content and building a formatted prompt string.
pub struct PromptBuilder {
    /// The instruction placed ahead of the article.
    instruction: String,
    /// The article text to be summarized.
    content: String,
    /// Upper bound on the characters of `content` included in the prompt.
    max_input_chars: usize,
}

/// Characters of article text sent to the model.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 3000;

impl PromptBuilder {
    /// Creates a new `PromptBuilder` with the given instruction.
    ///
    /// # Arguments
    ///
    /// * `instruction` - What the model should do with the article.
    ///
    /// # Returns
    ///
    /// A new instance of `PromptBuilder`.
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            content: String::new(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }

    /// Builds the standard news summary instruction for a target length.
    pub fn summary(max_chars: usize) -> Self {
        Self::new(format!(
            "Summarize the following news article in at most {max_chars} characters. \
             Answer in the language of the article. Reply with the summary only."
        ))
    }

    /// Adds the article text to the `PromptBuilder`.
    ///
    /// # Returns
    ///
    /// The updated `PromptBuilder` instance.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Builds the prompt string from the instruction and the cleaned, capped article text.
    pub fn build(&self) -> String {
        let article: String = Self::clean_text(&self.content)
            .chars()
            .take(self.max_input_chars)
            .collect();

        format!("{}\n\nArticle:\n{}", self.instruction, article)
    }

    /// Cleans the given text by removing blank lines and normalizing whitespace.
    ///
    /// # Arguments
    ///
    /// * `text` - The text to be cleaned.
    ///
    /// # Returns
    ///
    /// The cleaned text.
    fn clean_text(text: &str) -> String {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.split_whitespace().collect::<Vec<&str>>().join(" "))
            .collect::<Vec<String>>()
            .join("\n")
    }
}
