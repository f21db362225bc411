//! Locally authored progress widget updates.

use pbm_01_block_model::{WidgetBlock, WidgetConfig};

use crate::WidgetError;

/// Sets a progress widget's value.
///
/// Values never decrease unless `reset` is set, and never exceed `max`.
pub fn set_progress(widget: &mut WidgetBlock, value: u32, reset: bool) -> Result<u32, WidgetError> {
    let variant = widget.variant();
    let WidgetConfig::Progress {
        value: current,
        max,
        ..
    } = &mut widget.config
    else {
        return Err(WidgetError::NotAProgress(variant));
    };

    if value > *max {
        return Err(WidgetError::ProgressOutOfRange { value, max: *max });
    }
    if value < *current && !reset {
        return Err(WidgetError::ProgressRegression {
            current: *current,
            requested: value,
        });
    }

    *current = value;
    Ok(value)
}
