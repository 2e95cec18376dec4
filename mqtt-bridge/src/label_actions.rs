//! Label actions (spec.md §4.3): small transformations over a mutable label
//! map, applied in configured order while building a [`Metric`](crate::metric::Metric)
//! observation's labels.

use crate::labels::Labels;
use crate::replace_format::ReplacementFormat;
use crate::topic::TopicLevels;
use crate::topic_automaton::TopicAutomaton;

/// One label transformation.
///
/// `input_labels` and `output_labels` are permitted to alias (the same
/// `Labels` value borrowed twice at different points in the metric event
/// lifecycle, see spec.md §4.6) — where they do, [`LabelAction::Keep`] is a
/// no-op and [`LabelAction::Copy`] reads then writes.
pub enum LabelAction {
    /// If `input_labels[src]` exists, set `output_labels[dst]` to its value.
    Copy { src: String, dst: String },
    /// Remove `output_labels[name]` if present. Input is not consulted.
    Drop { name: String },
    /// If `input_labels[name]` exists, ensure `output_labels[name]` equals it.
    Keep { name: String },
    /// Look up the concrete topic in the embedded automaton; for every
    /// formatter list returned, and every formatter in it, compute the
    /// expansion against `topic_levels` and assign to `output_labels[dst]`.
    /// Later matches overwrite earlier ones.
    ReplacePath {
        dst: String,
        automaton: TopicAutomaton<Vec<ReplacementFormat>>,
    },
}

impl LabelAction {
    pub fn apply(&self, input_labels: &Labels, topic_levels: &TopicLevels<'_>, output_labels: &mut Labels) {
        match self {
            LabelAction::Copy { src, dst } => {
                if let Some(value) = input_labels.get(src) {
                    output_labels.set(dst.clone(), value.to_owned());
                }
            }
            LabelAction::Drop { name } => {
                output_labels.remove(name);
            }
            LabelAction::Keep { name } => {
                if let Some(value) = input_labels.get(name) {
                    output_labels.set(name.clone(), value.to_owned());
                }
            }
            LabelAction::ReplacePath { dst, automaton } => {
                for formats in automaton.find(topic_levels) {
                    for format in formats {
                        let expanded = format.expand(topic_levels);
                        output_labels.set(dst.clone(), expanded);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replace_format;

    fn levels(topic: &str) -> TopicLevels<'_> {
        TopicLevels::tokenize(topic)
    }

    #[test]
    fn copy_reads_from_input_and_writes_to_output() {
        let action = LabelAction::Copy {
            src: "room".to_owned(),
            dst: "zone".to_owned(),
        };

        let mut input = Labels::new();
        input.set("room", "kitchen");
        let mut output = Labels::new();

        action.apply(&input, &levels("x"), &mut output);
        assert_eq!(output.get("zone"), Some("kitchen"));
    }

    #[test]
    fn copy_is_a_no_op_when_source_is_missing() {
        let action = LabelAction::Copy {
            src: "missing".to_owned(),
            dst: "zone".to_owned(),
        };
        let input = Labels::new();
        let mut output = Labels::new();

        action.apply(&input, &levels("x"), &mut output);
        assert!(!output.contains("zone"));
    }

    #[test]
    fn drop_removes_from_output_only() {
        let action = LabelAction::Drop {
            name: "topic".to_owned(),
        };
        let input = Labels::new();
        let mut output = Labels::new();
        output.set("topic", "room/kitchen");

        action.apply(&input, &levels("x"), &mut output);
        assert!(!output.contains("topic"));
    }

    #[test]
    fn keep_copies_from_input_when_present() {
        let action = LabelAction::Keep {
            name: "room".to_owned(),
        };
        let mut input = Labels::new();
        input.set("room", "kitchen");
        let mut output = Labels::new();

        action.apply(&input, &levels("x"), &mut output);
        assert_eq!(output.get("room"), Some("kitchen"));
    }

    #[test]
    fn replace_path_expands_the_matched_formats_last_write_wins() {
        let mut automaton = TopicAutomaton::new();
        automaton
            .add("room/+/+", vec![replace_format::compile("\\2_\\1").format])
            .unwrap();
        automaton
            .add("room/+/north", vec![replace_format::compile("fixed").format])
            .unwrap();
        let automaton = automaton.freeze();

        let action = LabelAction::ReplacePath {
            dst: "location".to_owned(),
            automaton,
        };

        let input = Labels::new();
        let mut output = Labels::new();
        let topic_levels = levels("room/kitchen/north");

        action.apply(&input, &topic_levels, &mut output);
        // "room/+/north" (literal last level) is visited before "room/+/+"
        // at the shared trie depth, so the wildcard format's expansion is the
        // later write and wins.
        assert_eq!(output.get("location"), Some("kitchen_room"));
    }
}
