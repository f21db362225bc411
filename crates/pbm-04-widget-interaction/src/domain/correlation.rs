//! Response validation and correlation.

use pbm_01_block_model::{ResponseValue, WidgetBlock, WidgetConfig, WidgetResponse, WidgetVariant};

use crate::WidgetError;

/// How a recorded response relates to the responder's earlier ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First response from this responder.
    Appended,
    /// Replaces the responder's effective answer (re-answer or newer poll vote).
    Superseded,
    /// Single-choice vote older than the one already in effect. Kept in the
    /// list, ignored by the projection.
    Stale,
    /// Multi-choice vote unioned with the responder's earlier choices.
    Merged,
}

/// Validates `response` against the widget and appends it.
///
/// The list only grows; supersede and union are decided at read time.
pub fn record_response(
    widget: &mut WidgetBlock,
    response: WidgetResponse,
) -> Result<RecordOutcome, WidgetError> {
    validate_value(&widget.config, &response.value)?;

    let latest_prior = widget
        .responses
        .iter()
        .filter(|prior| prior.responder_id == response.responder_id)
        .map(|prior| prior.timestamp)
        .max();

    let outcome = match (&widget.config, latest_prior) {
        (WidgetConfig::Progress { .. }, _) => {
            return Err(WidgetError::NotInteractive(WidgetVariant::Progress));
        }
        (_, None) => RecordOutcome::Appended,
        (
            WidgetConfig::Button { allow_reanswer, .. }
            | WidgetConfig::Input { allow_reanswer, .. }
            | WidgetConfig::Confirm { allow_reanswer, .. },
            Some(_),
        ) => {
            if !allow_reanswer {
                return Err(WidgetError::DuplicateResponse {
                    responder: response.responder_id,
                });
            }
            RecordOutcome::Superseded
        }
        (WidgetConfig::Poll { allow_multiple: true, .. }, Some(_)) => RecordOutcome::Merged,
        (WidgetConfig::Poll { .. }, Some(latest)) if response.timestamp >= latest => {
            RecordOutcome::Superseded
        }
        (WidgetConfig::Poll { .. }, Some(_)) => RecordOutcome::Stale,
    };

    widget.responses.push(response);
    Ok(outcome)
}

fn validate_value(config: &WidgetConfig, value: &ResponseValue) -> Result<(), WidgetError> {
    match (config, value) {
        (WidgetConfig::Progress { .. }, _) => {
            Err(WidgetError::NotInteractive(WidgetVariant::Progress))
        }
        (WidgetConfig::Button { .. }, ResponseValue::Pressed)
        | (WidgetConfig::Input { .. }, ResponseValue::Text(_))
        | (WidgetConfig::Confirm { .. }, ResponseValue::Confirmed(_)) => Ok(()),
        (
            WidgetConfig::Poll {
                options,
                allow_multiple,
                ..
            },
            ResponseValue::Choices(choices),
        ) => {
            if choices.is_empty() {
                return Err(WidgetError::InvalidResponse("no option selected".into()));
            }
            if !allow_multiple && choices.len() != 1 {
                return Err(WidgetError::InvalidResponse(format!(
                    "single-choice poll takes one option, got {}",
                    choices.len()
                )));
            }
            if let Some(bad) = choices.iter().find(|&&c| c as usize >= options.len()) {
                return Err(WidgetError::InvalidResponse(format!(
                    "option {bad} out of range, poll has {} options",
                    options.len()
                )));
            }
            Ok(())
        }
        (config, value) => Err(WidgetError::InvalidResponse(format!(
            "{:?} widget cannot take {value:?}",
            config.variant()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::PeerId;

    fn peer(n: u8) -> PeerId {
        PeerId::new([n; 32])
    }

    fn button(allow_reanswer: bool) -> WidgetBlock {
        WidgetBlock::new(WidgetConfig::Button {
            label: "Deploy".into(),
            allow_reanswer,
        })
    }

    #[test]
    fn test_button_duplicate_rejected() {
        let mut widget = button(false);
        let press = WidgetResponse::new(peer(1), 1, ResponseValue::Pressed);

        assert_eq!(record_response(&mut widget, press.clone()), Ok(RecordOutcome::Appended));
        assert_eq!(
            record_response(&mut widget, press),
            Err(WidgetError::DuplicateResponse { responder: peer(1) })
        );
        assert_eq!(widget.responses.len(), 1);
    }

    #[test]
    fn test_button_reanswer_allowed() {
        let mut widget = button(true);
        record_response(&mut widget, WidgetResponse::new(peer(1), 1, ResponseValue::Pressed)).unwrap();
        let outcome =
            record_response(&mut widget, WidgetResponse::new(peer(1), 2, ResponseValue::Pressed));
        assert_eq!(outcome, Ok(RecordOutcome::Superseded));
        assert_eq!(widget.responses.len(), 2);
    }

    #[test]
    fn test_confirm_from_different_responders() {
        let mut widget = WidgetBlock::new(WidgetConfig::Confirm {
            prompt: "Merge?".into(),
            allow_reanswer: false,
        });
        for n in 1..=3 {
            let response = WidgetResponse::new(peer(n), n as u64, ResponseValue::Confirmed(n % 2 == 0));
            assert_eq!(record_response(&mut widget, response), Ok(RecordOutcome::Appended));
        }
    }

    #[test]
    fn test_wrong_value_type_rejected() {
        let mut widget = button(false);
        let result = record_response(
            &mut widget,
            WidgetResponse::new(peer(1), 1, ResponseValue::Text("hi".into())),
        );
        assert!(matches!(result, Err(WidgetError::InvalidResponse(_))));
        assert!(widget.responses.is_empty());
    }

    #[test]
    fn test_progress_not_interactive() {
        let mut widget = WidgetBlock::new(WidgetConfig::Progress {
            label: "Build".into(),
            value: 0,
            max: 100,
        });
        assert_eq!(
            record_response(&mut widget, WidgetResponse::new(peer(1), 1, ResponseValue::Pressed)),
            Err(WidgetError::NotInteractive(WidgetVariant::Progress))
        );
    }

    #[test]
    fn test_single_choice_poll_vote_validation() {
        let mut widget = WidgetBlock::new(WidgetConfig::poll("Lunch?", vec!["pizza", "sushi"]));

        let two = WidgetResponse::new(peer(1), 1, ResponseValue::Choices(vec![0, 1]));
        assert!(matches!(record_response(&mut widget, two), Err(WidgetError::InvalidResponse(_))));

        let none = WidgetResponse::new(peer(1), 1, ResponseValue::Choices(vec![]));
        assert!(matches!(record_response(&mut widget, none), Err(WidgetError::InvalidResponse(_))));

        let out_of_range = WidgetResponse::new(peer(1), 1, ResponseValue::Choices(vec![2]));
        assert!(matches!(
            record_response(&mut widget, out_of_range),
            Err(WidgetError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_single_choice_poll_supersede_and_stale() {
        let mut widget = WidgetBlock::new(WidgetConfig::poll("Lunch?", vec!["pizza", "sushi"]));
        let vote = |ts, choice| WidgetResponse::new(peer(1), ts, ResponseValue::Choices(vec![choice]));

        assert_eq!(record_response(&mut widget, vote(5, 0)), Ok(RecordOutcome::Appended));
        assert_eq!(record_response(&mut widget, vote(7, 1)), Ok(RecordOutcome::Superseded));
        assert_eq!(record_response(&mut widget, vote(6, 0)), Ok(RecordOutcome::Stale));
        assert_eq!(widget.responses.len(), 3);
    }

    #[test]
    fn test_multi_choice_poll_merges() {
        let mut widget = WidgetBlock::new(WidgetConfig::multi_poll("Toppings", vec!["a", "b", "c"]));
        let first = WidgetResponse::new(peer(1), 1, ResponseValue::Choices(vec![0, 2]));
        let second = WidgetResponse::new(peer(1), 2, ResponseValue::Choices(vec![1]));

        assert_eq!(record_response(&mut widget, first), Ok(RecordOutcome::Appended));
        assert_eq!(record_response(&mut widget, second), Ok(RecordOutcome::Merged));
    }
}
