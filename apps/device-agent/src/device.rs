//! Simulated hardware: one light sensor and one LED.

use serde::Serialize;

use zilink_protocol::messages::ComponentUpdate;

const LIGHT_MIN: u32 = 300;
const LIGHT_MAX: u32 = 400;
const LIGHT_STEP: u32 = 5;

/// Widget id of the LED on the dashboard.
pub const LED_COMPONENT: &str = "led";

/// One entry of the `sensorData` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: u32,
    pub unit: &'static str,
}

#[derive(Debug)]
pub struct SimulatedDevice {
    light: u32,
    led_on: bool,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self {
            light: LIGHT_MIN,
            led_on: false,
        }
    }

    /// Current light level, then steps the simulation forward.
    pub fn next_reading(&mut self) -> Vec<SensorReading> {
        let reading = SensorReading {
            kind: "light",
            value: self.light,
            unit: "lux",
        };
        self.light = if self.light >= LIGHT_MAX {
            LIGHT_MIN
        } else {
            self.light + LIGHT_STEP
        };
        vec![reading]
    }

    /// Applies an operator command. Returns the widget update to report
    /// back, or `None` if the command is not understood.
    pub fn apply_command(&mut self, command: &str) -> Option<ComponentUpdate> {
        match command {
            "toggle" => self.led_on = !self.led_on,
            "on" => self.led_on = true,
            "off" => self.led_on = false,
            _ => return None,
        }
        Some(ComponentUpdate::toggle(LED_COMPONENT, self.led_on))
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}
