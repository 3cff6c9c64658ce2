//! Lexical pattern groups behind the routing decision.
//!
//! Each group is a named, independently testable set of compiled regexes.
//! The router consults them in a fixed order; the groups themselves carry no
//! routing opinion.

use regex::Regex;
use std::sync::LazyLock;

pub struct PatternGroup {
    name: &'static str,
    patterns: Vec<Regex>,
}

impl PatternGroup {
    fn compile(name: &'static str, expressions: &[&str]) -> Self {
        let patterns = expressions
            .iter()
            .map(|expr| Regex::new(expr).expect("static pattern compiles"))
            .collect();
        Self { name, patterns }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }
}

static TIME_SENSITIVE: LazyLock<PatternGroup> = LazyLock::new(|| {
    PatternGroup::compile(
        "time-sensitive",
        &[
            r"(?i)\b(current|now|today|yesterday|tomorrow|this\s+(morning|afternoon|evening)|tonight)\b",
            r"(?i)\b(latest|recent|breaking|live|real\s*time)\b",
            r"(?i)\b(what\s+time|what\s+date|when\s+is)\b",
            r"(?i)\b(stock\s+(price|market)|crypto\s+price)\b",
        ],
    )
});

static FACTUAL: LazyLock<PatternGroup> = LazyLock::new(|| {
    PatternGroup::compile(
        "factual",
        &[
            r"(?i)\b(what\s+is|define|explain|describe)\b",
            r"(?i)\b(how\s+(do|does|to|can|much|many))\b",
            r"(?i)\b(where\s+(is|are|can|do))\b",
            r"(?i)\b(when\s+(is|are|was|were|did))\b",
            r"(?i)\b(who\s+(is|are|was|were))\b",
            r"(?i)\b(which\s+(is|are))\b",
        ],
    )
});

static CONVERSATIONAL: LazyLock<PatternGroup> = LazyLock::new(|| {
    PatternGroup::compile(
        "conversational",
        &[
            r"(?i)\b(tell\s+me\s+about|talk\s+about)\b",
            r"(?i)\b(i\s+(think|feel|believe|wonder))\b",
            r"(?i)\b(what\s+do\s+you\s+(think|feel|recommend))\b",
            r"(?i)\b(can\s+you\s+(help|write|create|make))\b",
        ],
    )
});

// Entity patterns stay case-sensitive: capitalization is the signal.
static ENTITY: LazyLock<PatternGroup> = LazyLock::new(|| {
    PatternGroup::compile(
        "entity",
        &[
            r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b",
            r"\b\d{4}\b",
            r"\$[0-9,]+(?:\.[0-9]{2})?\b",
        ],
    )
});

static FOLLOW_UP: LazyLock<PatternGroup> = LazyLock::new(|| {
    PatternGroup::compile(
        "follow-up",
        &[
            r"(?i)^\s*(and|also|plus|what\s+about|how\s+about)\b",
            r"(?i)\b(tell\s+me\s+more|go\s+on|keep\s+going|elaborate|continue)\b",
            r"(?i)^\s*(more|another\s+one|again|why|anything\s+else)\s*\??\s*$",
        ],
    )
});

pub fn time_sensitive() -> &'static PatternGroup {
    &TIME_SENSITIVE
}

pub fn factual() -> &'static PatternGroup {
    &FACTUAL
}

pub fn conversational() -> &'static PatternGroup {
    &CONVERSATIONAL
}

pub fn entity() -> &'static PatternGroup {
    &ENTITY
}

pub fn follow_up() -> &'static PatternGroup {
    &FOLLOW_UP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_sensitive_examples() {
        let group = time_sensitive();
        assert!(group.is_match("What happened today in the news?"));
        assert!(group.is_match("what's the latest on the election"));
        assert!(group.is_match("stock price of AAPL"));
        assert!(group.is_match("What time is it in Tokyo?"));
        assert!(!group.is_match("What is Python programming?"));
    }

    #[test]
    fn factual_examples() {
        let group = factual();
        assert!(group.is_match("What is the capital of France?"));
        assert!(group.is_match("how do I write a closure"));
        assert!(group.is_match("Who was Ada Lovelace?"));
        assert!(!group.is_match("good morning friend"));
    }

    #[test]
    fn conversational_examples() {
        let group = conversational();
        assert!(group.is_match("Tell me about your day"));
        assert!(group.is_match("I think this is great"));
        assert!(group.is_match("can you write a haiku"));
        assert!(group.is_match("What do you recommend?"));
        assert!(!group.is_match("capital of France"));
    }

    #[test]
    fn entity_examples() {
        let group = entity();
        assert!(group.is_match("Ada Lovelace wrote the first program"));
        assert!(group.is_match("back in 1969 something happened"));
        assert!(group.is_match("it costs $1,299.99 right now"));
        assert!(!group.is_match("lowercase words only here"));
    }

    #[test]
    fn entity_matching_is_case_sensitive() {
        assert!(!entity().is_match("ada lovelace wrote the first program"));
    }

    #[test]
    fn follow_up_examples() {
        let group = follow_up();
        assert!(group.is_match("and also?"));
        assert!(group.is_match("What about Germany?"));
        assert!(group.is_match("tell me more"));
        assert!(group.is_match("why?"));
        assert!(!group.is_match("completely new question about databases"));
    }

    #[test]
    fn group_names_are_stable() {
        assert_eq!(time_sensitive().name(), "time-sensitive");
        assert_eq!(follow_up().name(), "follow-up");
    }
}
