//! Shared UPS telemetry snapshot
//!
//! A single owned record, written only by parser callbacks running on the
//! engine's tick and read by the SNMP responder through a brief reader-lock
//! hold, per the reader/writer-lock discipline called out for inter-task
//! sharing.

/// Nine present-status booleans (RFC 1628 `upsBatteryStatus` family and
/// related discrete states)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentStatus {
    pub ac_present: bool,
    pub charging: bool,
    pub discharging: bool,
    pub fully_charged: bool,
    pub need_replacement: bool,
    pub below_remaining_capacity_limit: bool,
    pub battery_present: bool,
    pub overload: bool,
    pub shutdown_imminent: bool,
}

/// Identification and capacity constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub rechargeable: bool,
    pub capacity_mode: u8,
    pub design_capacity: u16,
    pub full_charge_capacity: u16,
    pub warning_capacity_limit: u16,
    pub remaining_capacity_limit: u16,
    pub device_chemistry_code: u8,
    pub capacity_granularity_1: u8,
    pub capacity_granularity_2: u8,
    pub i_manufacturer_2bit: u8,
    pub i_product_2bit: u8,
    pub i_serial_number_2bit: u8,
    pub i_name_2bit: u8,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            rechargeable: true,
            capacity_mode: 2,
            design_capacity: 100,
            full_charge_capacity: 100,
            warning_capacity_limit: 20,
            remaining_capacity_limit: 10,
            device_chemistry_code: 0x05,
            capacity_granularity_1: 1,
            capacity_granularity_2: 1,
            i_manufacturer_2bit: 1,
            i_product_2bit: 2,
            i_serial_number_2bit: 3,
            i_name_2bit: 2,
        }
    }
}

/// Battery telemetry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Battery {
    /// Signed millivolts
    pub battery_voltage: i32,
    /// Signed centiamps (10 mA units)
    pub battery_current: i32,
    /// Config voltage, millivolts
    pub config_voltage: u32,
    pub run_time_to_empty_s: u32,
    pub remaining_time_limit_s: u32,
    /// Tenths of a kelvin
    pub temperature: u32,
    pub manufacturer_date: u32,
    /// Percent, 0..100
    pub remaining_capacity: u8,
}

/// Input line telemetry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Input {
    pub voltage: u32,
    pub frequency: u32,
    pub config_voltage: u32,
    pub low_voltage_transfer: u32,
    pub high_voltage_transfer: u32,
}

/// Output line telemetry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Output {
    pub percent_load: u32,
    pub config_active_power: u32,
    pub config_voltage: u32,
    pub voltage: u32,
    /// Signed centiamps
    pub current: i32,
    pub frequency: u32,
}

/// The full process-wide snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telemetry {
    pub present_status: PresentStatus,
    pub summary: Summary,
    pub battery: Battery,
    pub input: Input,
    pub output: Output,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            present_status: PresentStatus::default(),
            summary: Summary::default(),
            battery: Battery::default(),
            input: Input::default(),
            output: Output::default(),
        }
    }
}

impl Telemetry {
    /// Force the degraded-state side effect fired once per crossing of the
    /// heartbeat failure threshold. Preserved exactly as the source computes
    /// it: `remaining_capacity` is set to 1, not 0, which biases
    /// `upsBatteryStatus` to "low" rather than "depleted" — this is
    /// deliberate, not a bug, and must not be "fixed".
    pub fn apply_degraded_state(&mut self) {
        self.battery.remaining_capacity = 1;
        self.battery.remaining_time_limit_s = 1;
        self.present_status.fully_charged = false;
        self.present_status.below_remaining_capacity_limit = true;
        self.present_status.shutdown_imminent = true;
        self.present_status.charging = false;
        self.present_status.discharging = true;
        self.present_status.ac_present = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_summary_matches_factory_constants() {
        let summary = Summary::default();
        assert!(summary.rechargeable);
        assert_eq!(summary.design_capacity, 100);
        assert_eq!(summary.remaining_capacity_limit, 10);
    }

    #[test]
    fn test_degraded_state_biases_low_not_depleted() {
        let mut telemetry = Telemetry::default();
        telemetry.apply_degraded_state();
        assert_eq!(telemetry.battery.remaining_capacity, 1);
        assert_eq!(telemetry.battery.remaining_time_limit_s, 1);
        assert!(telemetry.present_status.shutdown_imminent);
        assert!(telemetry.present_status.discharging);
        assert!(!telemetry.present_status.ac_present);
    }
}
