//! Split-intent heuristic for free-text modification instructions

const COUNT_WORDS: [&str; 12] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "multiple",
    "several",
];

/// Whether an instruction asks for test cases to be split.
///
/// True when the instruction mentions "split" together with a digit or a
/// count word such as "three" or "several".
pub fn detect_split_intent(instruction: &str) -> bool {
    let lower = instruction.to_lowercase();
    if !lower.contains("split") {
        return false;
    }

    lower.chars().any(|c| c.is_ascii_digit())
        || lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| COUNT_WORDS.contains(&word))
}
