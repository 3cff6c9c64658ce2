use super::patterns;
use crate::services::ServiceKind;
use tracing::debug;

/// Everything a routing rule may consult.
pub struct RouteInput<'a> {
    pub message: &'a str,
    pub word_count: usize,
    pub recent_service: Option<ServiceKind>,
    pub entity_min_words: usize,
}

/// One entry of the decision list: a label and a predicate that either
/// claims the message for a service or passes.
struct Rule {
    label: &'static str,
    decide: fn(&RouteInput<'_>) -> Option<ServiceKind>,
}

/// The outcome of a routing decision, with the rule that made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteChoice {
    pub service: ServiceKind,
    pub rule: &'static str,
}

/// Ordered, data-driven message router.
///
/// Rules are evaluated in sequence and the first one that claims the message
/// wins. The list orders intent signals from strongest to weakest: an
/// explicit follow-up sticks with whatever service the conversation was
/// already using, conversational phrasing keeps small talk off the web
/// service, and time-sensitive or factual phrasing pulls queries toward it.
pub struct Router {
    rules: Vec<Rule>,
    entity_min_words: usize,
}

fn sticky_follow_up(input: &RouteInput<'_>) -> Option<ServiceKind> {
    if patterns::follow_up().is_match(input.message) {
        input.recent_service
    } else {
        None
    }
}

fn conversational(input: &RouteInput<'_>) -> Option<ServiceKind> {
    patterns::conversational()
        .is_match(input.message)
        .then_some(ServiceKind::Conversational)
}

fn time_sensitive(input: &RouteInput<'_>) -> Option<ServiceKind> {
    patterns::time_sensitive()
        .is_match(input.message)
        .then_some(ServiceKind::WebSearch)
}

fn factual(input: &RouteInput<'_>) -> Option<ServiceKind> {
    patterns::factual()
        .is_match(input.message)
        .then_some(ServiceKind::WebSearch)
}

fn entity_rich(input: &RouteInput<'_>) -> Option<ServiceKind> {
    (input.word_count > input.entity_min_words && patterns::entity().is_match(input.message))
        .then_some(ServiceKind::WebSearch)
}

fn default_conversational(_input: &RouteInput<'_>) -> Option<ServiceKind> {
    Some(ServiceKind::Conversational)
}

impl Router {
    pub fn new(entity_min_words: usize) -> Self {
        Self {
            rules: vec![
                Rule {
                    label: "follow-up-sticky",
                    decide: sticky_follow_up,
                },
                Rule {
                    label: "conversational",
                    decide: conversational,
                },
                Rule {
                    label: "time-sensitive",
                    decide: time_sensitive,
                },
                Rule {
                    label: "factual",
                    decide: factual,
                },
                Rule {
                    label: "entity-rich",
                    decide: entity_rich,
                },
                Rule {
                    label: "default",
                    decide: default_conversational,
                },
            ],
            entity_min_words,
        }
    }

    /// Decide which service should answer `message`.
    ///
    /// `recent_service` is the sticky-routing hint: the service the user's
    /// conversation used most recently, if within the lookback window.
    pub fn decide(&self, message: &str, recent_service: Option<ServiceKind>) -> RouteChoice {
        let input = RouteInput {
            message,
            word_count: message.split_whitespace().count(),
            recent_service,
            entity_min_words: self.entity_min_words,
        };

        for rule in &self.rules {
            if let Some(service) = (rule.decide)(&input) {
                debug!(rule = rule.label, %service, "routing rule matched");
                return RouteChoice {
                    service,
                    rule: rule.label,
                };
            }
        }

        // The decision list ends with an unconditional rule; this is the
        // compiler's proof obligation, not a reachable path.
        RouteChoice {
            service: ServiceKind::Conversational,
            rule: "default",
        }
    }
}
