//! Fixed prompt pools and the scripted conversation.

use crate::payload::ChatMessage;

/// Models targeted when `MODELS` is not configured.
pub const DEFAULT_MODELS: [&str; 3] = ["qwen3-32b", "qwen25-14b-instruct", "tiny-llama"];

/// Prompts for single-message completions, from trivial to long-form.
pub const SIMPLE_PROMPTS: [&str; 9] = [
    "What is 2+2?",
    "Name three primary colors.",
    "What's the capital of France?",
    "Explain quantum computing in simple terms suitable for a 12-year-old, using clear analogies.",
    "Create a step-by-step plan to learn Python from beginner to intermediate level in three months.",
    "Compare the advantages and disadvantages of remote work versus office work, with practical examples.",
    "Write a short science fiction story set in a floating city where gravity occasionally fails.",
    "Draft a concise, professional email requesting a project deadline extension due to unexpected technical issues.",
    "Analyze the economic impact of renewable energy adoption on traditional energy sectors.",
];

/// The fixed user → assistant → user history sent by multi-turn completions.
pub fn conversation() -> Vec<ChatMessage> {
    vec![
        ChatMessage::user("Hello! Can you help me with Python?"),
        ChatMessage::assistant(
            "Of course! I'd be happy to help you with Python. What would you like to know?",
        ),
        ChatMessage::user("How do I read a CSV file?"),
    ]
}

/// Prompts asking the model about an uploaded file.
pub fn analysis_prompts(filename: &str) -> [String; 4] {
    [
        format!("Summarize the contents of {}", filename),
        format!("What are the key points in {}?", filename),
        format!("Extract the main data from {}", filename),
        format!("Analyze {} and provide insights", filename),
    ]
}
