#![allow(async_fn_in_trait)]

use serde::{Deserialize, Serialize};

use crate::core::time::DateTime;

/// Everything the core asks the external command layer to do. Re-emitted only
/// on change; the layer owns transport and brand-specific wire formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Heating-curve offset for the current hour.
    SetOffset { offset: i32 },
    /// Engage or release the hot-water boost.
    WaterBoost { start: bool, target_temp: i32 },
    /// Predicted start of the next hot-water boost, for display surfaces.
    /// `None` clears a previously announced start.
    NextWaterBoost { at: Option<DateTime> },
    /// Ventilation boost on/off.
    VentBoost { on: bool },
}

/// Single seam towards the heat-pump. Brand variants (Nibe/IVT/Thermia) are
/// adapters behind this trait, not inheritance chains.
pub trait CommandSink {
    async fn dispatch(&self, command: Command) -> anyhow::Result<()>;
}

/// Sink for running without a physical pump attached: commands end up in the
/// log only.
pub struct TracingSink;

impl CommandSink for TracingSink {
    async fn dispatch(&self, command: Command) -> anyhow::Result<()> {
        tracing::info!("Dispatching command: {:?}", command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_format_is_tagged() {
        let json = serde_json::to_value(Command::WaterBoost {
            start: true,
            target_temp: 47,
        })
        .unwrap();

        assert_eq!(
            json,
            serde_json::json!({"type": "water_boost", "start": true, "target_temp": 47})
        );

        let next = serde_json::to_value(Command::NextWaterBoost { at: None }).unwrap();
        assert_eq!(next, serde_json::json!({"type": "next_water_boost", "at": null}));

        let parsed: Command = serde_json::from_value(serde_json::json!({
            "type": "set_offset",
            "offset": -3
        }))
        .unwrap();
        assert_eq!(parsed, Command::SetOffset { offset: -3 });
    }
}
