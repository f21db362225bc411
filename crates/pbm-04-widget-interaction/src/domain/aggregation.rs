//! Poll results as a pure projection over the response list.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use pbm_01_block_model::{ResponseValue, WidgetBlock, WidgetConfig};
use shared_types::{LogicalTimestamp, PeerId};

use crate::WidgetError;

/// Result row for one poll option.
#[derive(Clone, Debug, PartialEq)]
pub struct PollTally {
    pub option: u32,
    pub label: String,
    /// Distinct responders whose effective answer includes this option.
    pub count: u32,
    /// `count / distinct responders * 100`, unrounded.
    pub percentage: f64,
}

impl PollTally {
    /// Percentage rounded to one decimal place, for display.
    pub fn rounded_percentage(&self) -> f64 {
        (self.percentage * 10.0).round() / 10.0
    }
}

/// Effective choices of every responder, ordered by responder id.
///
/// Single-choice polls keep the vote with the newest timestamp, and on equal
/// timestamps the greater choice set; multi-choice polls union every vote.
pub fn effective_choices(widget: &WidgetBlock) -> Result<Vec<(PeerId, BTreeSet<u32>)>, WidgetError> {
    let allow_multiple = match &widget.config {
        WidgetConfig::Poll { allow_multiple, .. } => *allow_multiple,
        other => return Err(WidgetError::NotAPoll(other.variant())),
    };

    let mut effective: BTreeMap<PeerId, (LogicalTimestamp, BTreeSet<u32>)> = BTreeMap::new();
    for response in &widget.responses {
        let ResponseValue::Choices(choices) = &response.value else {
            continue;
        };
        let chosen = choices.iter().copied();

        match effective.get_mut(&response.responder_id) {
            Some((_, set)) if allow_multiple => set.extend(chosen),
            Some((timestamp, set)) => {
                let chosen: BTreeSet<u32> = chosen.collect();
                let wins = match response.timestamp.cmp(timestamp) {
                    Ordering::Greater => true,
                    Ordering::Equal => chosen > *set,
                    Ordering::Less => false,
                };
                if wins {
                    *timestamp = response.timestamp;
                    *set = chosen;
                }
            }
            None => {
                effective.insert(response.responder_id, (response.timestamp, chosen.collect()));
            }
        }
    }

    Ok(effective
        .into_iter()
        .map(|(responder, (_, set))| (responder, set))
        .collect())
}

/// Recomputes poll results from scratch.
///
/// Replaying the same response set in any order gives the same tallies.
pub fn poll_results(widget: &WidgetBlock) -> Result<Vec<PollTally>, WidgetError> {
    let options = match &widget.config {
        WidgetConfig::Poll { options, .. } => options,
        other => return Err(WidgetError::NotAPoll(other.variant())),
    };

    let effective = effective_choices(widget)?;
    let responders = effective.len();

    Ok(options
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let option = index as u32;
            let count = effective
                .iter()
                .filter(|(_, set)| set.contains(&option))
                .count();
            let percentage = if responders == 0 {
                0.0
            } else {
                count as f64 * 100.0 / responders as f64
            };
            PollTally {
                option,
                label: label.clone(),
                count: count as u32,
                percentage,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_response;
    use pbm_01_block_model::WidgetResponse;

    fn peer(n: u8) -> PeerId {
        PeerId::new([n; 32])
    }

    fn vote(responder: u8, ts: LogicalTimestamp, choices: Vec<u32>) -> WidgetResponse {
        WidgetResponse::new(peer(responder), ts, ResponseValue::Choices(choices))
    }

    #[test]
    fn test_two_thirds_one_third_zero() {
        let mut widget = WidgetBlock::new(WidgetConfig::poll("Ship?", vec!["yes", "no", "later"]));
        record_response(&mut widget, vote(1, 1, vec![0])).unwrap();
        record_response(&mut widget, vote(2, 2, vec![0])).unwrap();
        record_response(&mut widget, vote(3, 3, vec![1])).unwrap();

        let results = poll_results(&widget).unwrap();
        let counts: Vec<u32> = results.iter().map(|t| t.count).collect();
        let rounded: Vec<f64> = results.iter().map(PollTally::rounded_percentage).collect();

        assert_eq!(counts, vec![2, 1, 0]);
        assert_eq!(rounded, vec![66.7, 33.3, 0.0]);
    }

    #[test]
    fn test_no_responses_all_zero() {
        let widget = WidgetBlock::new(WidgetConfig::poll("Q", vec!["a", "b"]));
        let results = poll_results(&widget).unwrap();
        assert!(results.iter().all(|t| t.count == 0 && t.percentage == 0.0));
    }

    #[test]
    fn test_single_choice_latest_vote_counts() {
        let mut widget = WidgetBlock::new(WidgetConfig::poll("Q", vec!["a", "b"]));
        record_response(&mut widget, vote(1, 5, vec![0])).unwrap();
        record_response(&mut widget, vote(1, 9, vec![1])).unwrap();
        record_response(&mut widget, vote(1, 7, vec![0])).unwrap();

        let results = poll_results(&widget).unwrap();
        assert_eq!(results[0].count, 0);
        assert_eq!(results[1].count, 1);
        assert_eq!(results[1].percentage, 100.0);
    }

    #[test]
    fn test_multi_choice_union_per_responder() {
        let mut widget = WidgetBlock::new(WidgetConfig::multi_poll("Q", vec!["a", "b", "c"]));
        record_response(&mut widget, vote(1, 1, vec![0])).unwrap();
        record_response(&mut widget, vote(1, 2, vec![1, 0])).unwrap();
        record_response(&mut widget, vote(2, 3, vec![2])).unwrap();

        let counts: Vec<u32> = poll_results(&widget).unwrap().iter().map(|t| t.count).collect();
        assert_eq!(counts, vec![1, 1, 1]);
    }

    #[test]
    fn test_projection_is_order_independent() {
        let votes = vec![
            vote(1, 1, vec![0]),
            vote(2, 2, vec![1]),
            vote(1, 3, vec![2]),
            vote(3, 4, vec![2]),
        ];
        let mut forward = WidgetBlock::new(WidgetConfig::poll("Q", vec!["a", "b", "c"]));
        let mut backward = forward.clone();

        for v in votes.iter().cloned() {
            forward.responses.push(v);
        }
        for v in votes.iter().rev().cloned() {
            backward.responses.push(v);
        }

        assert_eq!(poll_results(&forward).unwrap(), poll_results(&backward).unwrap());
        assert_eq!(poll_results(&forward).unwrap(), poll_results(&forward).unwrap());
    }

    #[test]
    fn test_equal_timestamp_revotes_ignore_replay_order() {
        let votes = [vote(1, 4, vec![0]), vote(1, 4, vec![2]), vote(1, 4, vec![1])];
        let orders = [[0, 1, 2], [2, 1, 0], [1, 0, 2], [2, 0, 1]];

        let tallies: Vec<Vec<u32>> = orders
            .iter()
            .map(|order| {
                let mut widget = WidgetBlock::new(WidgetConfig::poll("Q", vec!["a", "b", "c"]));
                for &index in order {
                    widget.responses.push(votes[index].clone());
                }
                poll_results(&widget).unwrap().iter().map(|t| t.count).collect()
            })
            .collect();

        assert!(tallies.iter().all(|counts| *counts == vec![0, 0, 1]));
    }

    #[test]
    fn test_single_choice_percentages_sum_to_at_most_100() {
        let mut widget = WidgetBlock::new(WidgetConfig::poll("Q", vec!["a", "b", "c"]));
        for responder in 1..=7u8 {
            let choice = u32::from(responder % 3);
            record_response(&mut widget, vote(responder, responder as u64, vec![choice])).unwrap();
        }
        let total: f64 = poll_results(&widget).unwrap().iter().map(|t| t.percentage).sum();
        assert!(total <= 100.0 + 1e-9);
    }

    #[test]
    fn test_results_on_non_poll() {
        let widget = WidgetBlock::new(WidgetConfig::Button {
            label: "x".into(),
            allow_reanswer: false,
        });
        assert!(matches!(poll_results(&widget), Err(WidgetError::NotAPoll(_))));
    }
}
