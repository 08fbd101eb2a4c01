//! MAX6650 fan-speed regulator driver
//!
//! In closed-loop mode the chip regulates fan speed so that, per the
//! datasheet,
//!
//! ```text
//! fCLK / (128 x (KTACH + 1)) = 2 x FanSpeed / KSCALE
//! ```
//!
//! With the internal 254 kHz oscillator and FanSpeed in revolutions per
//! second this reduces to
//!
//! ```text
//! KTACH = (992 x KSCALE / FanSpeed) - 1
//! ```
//!
//! Reading back, the tachometer count register holds pulses counted over the
//! count time programmed at init: `FanSpeed = (tach / 2) / COUNT_TIME`.
//!
//! All conversions use truncating integer arithmetic in a fixed order. The
//! truncation is part of the register contract and intentionally not
//! replaced by floating point: `rpm = (rpm_max / 100) * percent` loses up to
//! `rpm_max % 100` RPM, which is most visible at low percentages.

use crate::bus::RegisterBus;
use fancon_core::{FanControllerConfig, FanconError, KScale, Result};
use tracing::{debug, info, warn};

/// Fan speed (KTACH) register, R/W
pub const SPEED_REG: u8 = 0x00;
/// Configuration register, R/W
pub const CONFIG_REG: u8 = 0x02;
/// GPIO definition register, R/W
pub const GPIO_DEF_REG: u8 = 0x04;
/// DAC register, R/W
pub const DAC_REG: u8 = 0x06;
/// Alarm enable register, R/W
pub const ALARM_ENABLE_REG: u8 = 0x08;
/// Alarm status register, R
pub const ALARM_REG: u8 = 0x0A;
/// Tachometer 0 count register, R
pub const TACH0_REG: u8 = 0x0C;
/// GPIO status register, R
pub const GPIO_STAT_REG: u8 = 0x14;
/// Tachometer count time register, R/W
pub const COUNT_REG: u8 = 0x16;

/// Count time written at init and used by the tachometer conversion
pub const COUNT_TIME: u8 = 2;

/// `fCLK / 256` for the internal 254 kHz oscillator
pub const KTACH_CLOCK: u32 = 992;

/// Highest percent accepted by `set_speed`
pub const MAX_PERCENT: u32 = 100;

/// Compose the configuration register byte
///
/// `mode` occupies bits 5:4, the 12 V select bit 3 and KSCALE bits 2:0.
pub fn config_byte(config: &FanControllerConfig) -> u8 {
    (config.operating_mode.code() & 0x03) << 4
        | (config.fan_voltage.code() & 0x01) << 3
        | (config.k_scale.code() & 0x07)
}

/// Target RPM for a percentage of the rated speed
pub fn percent_to_rpm(percent: u32, rpm_max: u16) -> u32 {
    (u32::from(rpm_max) / 100) * percent
}

/// KTACH register value that regulates to `rpm`
///
/// The register is 8 bits wide. Targets below one revolution per second, or
/// whose KTACH exceeds 255, saturate at 255 (the slowest speed the chip can
/// regulate); a KTACH that would go negative saturates at 0.
pub fn rpm_to_ktach(rpm: u32, k_scale: KScale) -> u8 {
    let rps = rpm / 60;
    if rps == 0 {
        return u8::MAX;
    }
    let ktach = (KTACH_CLOCK * k_scale.factor()) / rps;
    ktach.saturating_sub(1).min(u32::from(u8::MAX)) as u8
}

/// Percentage of the rated speed for a raw tachometer count
pub fn tach_to_percent(tach: u8, rpm_max: u16) -> u32 {
    let rps = (u32::from(tach) / 2) / u32::from(COUNT_TIME);
    rps * 60 * 100 / u32::from(rpm_max)
}

/// Per-initialization driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DriverState {
    address: u8,
    config: FanControllerConfig,
}

/// MAX6650 driver bound to one bus
pub struct Max6650<B: RegisterBus> {
    bus: B,
    state: DriverState,
}

impl<B: RegisterBus> Max6650<B> {
    /// Initialize the chip
    ///
    /// Resolves the bus address from the ADD strapping, writes the
    /// configuration byte and then the count time. Fails without retrying if
    /// either write fails, or if the bus or the configuration is missing.
    pub fn initialize(bus: Option<B>, config: Option<FanControllerConfig>) -> Result<Self> {
        let Some(mut bus) = bus else {
            return Err(FanconError::Unavailable(
                "MAX6650: external bus interface is not initialized".to_string(),
            ));
        };
        let Some(config) = config else {
            return Err(FanconError::Unavailable(
                "MAX6650: no configuration available".to_string(),
            ));
        };

        let state = Self::configure(&mut bus, config)?;
        info!(
            "MAX6650 initialized at 0x{:02X} ({:?}, KSCALE {}, {} RPM max)",
            state.address,
            config.operating_mode,
            config.k_scale.factor(),
            config.rpm_max
        );
        Ok(Self { bus, state })
    }

    fn configure(bus: &mut B, config: FanControllerConfig) -> Result<DriverState> {
        config.validate()?;
        let address = config.address_line.bus_address();

        let byte = config_byte(&config);
        debug!("MAX6650 0x{:02X}: config byte 0x{:02X}", address, byte);
        bus.write(address, CONFIG_REG, &[byte])?;
        bus.write(address, COUNT_REG, &[COUNT_TIME])?;

        Ok(DriverState { address, config })
    }

    /// Re-run initialization with a new configuration
    ///
    /// The current state is replaced only after both register writes
    /// succeed; on failure the driver keeps its previous address and config.
    pub fn reconfigure(&mut self, config: FanControllerConfig) -> Result<()> {
        let state = Self::configure(&mut self.bus, config)?;
        self.state = state;
        Ok(())
    }

    /// Bus address resolved at initialization
    pub fn address(&self) -> u8 {
        self.state.address
    }

    /// Active configuration
    pub fn config(&self) -> &FanControllerConfig {
        &self.state.config
    }

    /// Check that the chip acknowledges its address
    pub fn probe(&mut self, trials: u32) -> Result<()> {
        self.bus.is_device_ready(self.state.address, trials)
    }

    /// Set the regulated speed in percent of `rpm_max`
    ///
    /// Values above 100 are clamped to 100. On success the actual speed is
    /// read back and returned.
    pub fn set_speed(&mut self, target_percent: u32) -> Result<u32> {
        let percent = if target_percent > MAX_PERCENT {
            warn!(
                "MAX6650: speed should be in range 0..100%, clamping {}% to 100%",
                target_percent
            );
            MAX_PERCENT
        } else {
            target_percent
        };

        let config = self.state.config;
        let rpm = percent_to_rpm(percent, config.rpm_max);
        let ktach = rpm_to_ktach(rpm, config.k_scale);
        debug!(
            "MAX6650: {}% -> {} RPM -> KTACH {} (KSCALE {})",
            percent,
            rpm,
            ktach,
            config.k_scale.factor()
        );

        self.bus.write(self.state.address, SPEED_REG, &[ktach])?;
        self.get_speed()
    }

    /// Read the measured speed in percent of `rpm_max`
    ///
    /// A failed tachometer read is reported as an error.
    pub fn get_speed(&mut self) -> Result<u32> {
        let mut tach = [0u8; 1];
        self.bus.read(self.state.address, TACH0_REG, &mut tach)?;

        let percent = tach_to_percent(tach[0], self.state.config.rpm_max);
        debug!("MAX6650: tach {} -> {}%", tach[0], percent);
        Ok(percent)
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusSpeed, RecoveringBus};
    use crate::sim::SimulatedMax6650;
    use fancon_core::{AddressLine, FanVoltage, OperatingMode};

    type SimBus = RecoveringBus<SimulatedMax6650>;

    fn sim_bus(address: u8) -> SimBus {
        RecoveringBus::new(SimulatedMax6650::new(address), BusSpeed::Standard, 1).unwrap()
    }

    fn bench_config() -> FanControllerConfig {
        FanControllerConfig {
            address_line: AddressLine::Gnd,
            operating_mode: OperatingMode::ClosedLoop,
            fan_voltage: FanVoltage::V12,
            k_scale: KScale::X4,
            rpm_max: 3000,
        }
    }

    fn driver(config: FanControllerConfig) -> Max6650<SimBus> {
        let bus = sim_bus(config.address_line.bus_address());
        Max6650::initialize(Some(bus), Some(config)).unwrap()
    }

    #[test]
    fn test_config_byte_composition() {
        let config = FanControllerConfig::default();
        // closed loop (2) << 4 | 12V << 3 | KSCALE 16 (4)
        assert_eq!(config_byte(&config), 0b0010_1100);

        let config = FanControllerConfig {
            operating_mode: OperatingMode::OpenLoop,
            fan_voltage: FanVoltage::V5,
            k_scale: KScale::X1,
            ..Default::default()
        };
        assert_eq!(config_byte(&config), 0b0011_0000);
    }

    #[test]
    fn test_percent_to_rpm_truncates_before_scaling() {
        // 10550 / 100 = 105, so 50% is 5250 and not 5275
        assert_eq!(percent_to_rpm(50, 10550), 5250);
        assert_eq!(percent_to_rpm(100, 10500), 10500);
        assert_eq!(percent_to_rpm(1, 10500), 105);
        assert_eq!(percent_to_rpm(0, 10500), 0);
    }

    #[test]
    fn test_rpm_to_ktach_reference_values() {
        // Full speed of the default fan: 10500 RPM = 175 rps; 15872 / 175 = 90
        assert_eq!(rpm_to_ktach(10500, KScale::X16), 89);
        // 50%: 5250 RPM = 87 rps; 15872 / 87 = 182
        assert_eq!(rpm_to_ktach(5250, KScale::X16), 181);
        assert_eq!(rpm_to_ktach(3000, KScale::X4), 78);
    }

    #[test]
    fn test_rpm_to_ktach_saturates() {
        // Below 1 rps there is nothing to divide by
        assert_eq!(rpm_to_ktach(0, KScale::X16), 255);
        assert_eq!(rpm_to_ktach(59, KScale::X1), 255);
        // 1% of the default fan: 105 RPM = 1 rps; 15871 does not fit the register
        assert_eq!(rpm_to_ktach(105, KScale::X16), 255);
        // Faster than the prescaler can express
        assert_eq!(rpm_to_ktach(60 * 2000, KScale::X1), 0);
    }

    #[test]
    fn test_rpm_to_ktach_saturates_where_byte_store_wraps() {
        // Low targets on a fast fan need a KTACH wider than the register.
        // Truncating it to 8 bits would program a faster speed than asked.
        let cases = [(2, 5289, 169), (3, 3173, 101), (5, 1983, 191), (10, 932, 164)];
        for (percent, wide, truncated) in cases {
            let rpm = percent_to_rpm(percent, 10500);
            let exact = KTACH_CLOCK * KScale::X16.factor() / (rpm / 60) - 1;
            assert_eq!(exact, wide);
            assert_eq!(exact as u8, truncated);
            assert_eq!(rpm_to_ktach(rpm, KScale::X16), u8::MAX);
        }
    }

    #[test]
    fn test_target_rpm_monotonic_and_ktach_non_increasing() {
        for config in [FanControllerConfig::default(), bench_config()] {
            let mut last_rpm = 0;
            let mut last_ktach = u8::MAX;
            for percent in 0..=100 {
                let rpm = percent_to_rpm(percent, config.rpm_max);
                let ktach = rpm_to_ktach(rpm, config.k_scale);
                assert!(rpm >= last_rpm, "rpm dropped at {}%", percent);
                assert!(ktach <= last_ktach, "ktach rose at {}%", percent);
                last_rpm = rpm;
                last_ktach = ktach;
            }
        }
    }

    #[test]
    fn test_monotonic_at_boundaries() {
        let config = FanControllerConfig::default();
        let k = |p| rpm_to_ktach(percent_to_rpm(p, config.rpm_max), config.k_scale);
        assert!(k(1) >= k(50));
        assert!(k(50) >= k(100));
        assert!(percent_to_rpm(1, 10500) < percent_to_rpm(50, 10500));
        assert!(percent_to_rpm(50, 10500) < percent_to_rpm(100, 10500));
    }

    #[test]
    fn test_tach_to_percent() {
        // 200 pulses -> 50 rps -> 3000 RPM
        assert_eq!(tach_to_percent(200, 3000), 100);
        assert_eq!(tach_to_percent(100, 3000), 50);
        assert_eq!(tach_to_percent(0, 3000), 0);
        // Odd counts truncate twice: 203 / 2 = 101, / 2 = 50
        assert_eq!(tach_to_percent(203, 3000), 100);
    }

    #[test]
    fn test_initialize_writes_config_then_count() {
        let fan = driver(FanControllerConfig::default());
        assert_eq!(fan.address(), 0x90);

        let sim = fan.bus().peripheral();
        assert_eq!(
            sim.writes(),
            &[(CONFIG_REG, vec![0b0010_1100]), (COUNT_REG, vec![COUNT_TIME])]
        );
    }

    #[test]
    fn test_initialize_uses_strapped_address() {
        let config = FanControllerConfig {
            address_line: AddressLine::Res10k,
            ..Default::default()
        };
        let fan = driver(config);
        assert_eq!(fan.address(), 0x3E);
    }

    #[test]
    fn test_initialize_without_bus_or_config() {
        let result = Max6650::<SimBus>::initialize(None, Some(FanControllerConfig::default()));
        assert!(matches!(result, Err(FanconError::Unavailable(_))));

        let result = Max6650::initialize(Some(sim_bus(0x90)), None);
        assert!(matches!(result, Err(FanconError::Unavailable(_))));
    }

    #[test]
    fn test_initialize_fails_when_device_absent() {
        // Chip strapped to VCC, driver configured for GND
        let result = Max6650::initialize(Some(sim_bus(0x96)), Some(FanControllerConfig::default()));
        assert!(matches!(result, Err(FanconError::Bus(_))));
    }

    #[test]
    fn test_initialize_fails_on_count_write() {
        let mut bus = sim_bus(0x90);
        bus.peripheral_mut().fail_transfers_after(1, 1);
        let result = Max6650::initialize(Some(bus), Some(FanControllerConfig::default()));
        assert!(result.is_err());
    }

    #[test]
    fn test_set_speed_writes_ktach() {
        let mut fan = driver(FanControllerConfig::default());
        fan.set_speed(100).unwrap();
        assert_eq!(fan.bus().peripheral().register(SPEED_REG), 89);

        fan.set_speed(0).unwrap();
        assert_eq!(fan.bus().peripheral().register(SPEED_REG), 255);
    }

    #[test]
    fn test_set_speed_clamps_above_100() {
        let mut over = driver(bench_config());
        let mut full = driver(bench_config());

        let over_actual = over.set_speed(250).unwrap();
        let full_actual = full.set_speed(100).unwrap();

        assert_eq!(over_actual, full_actual);
        assert_eq!(
            over.bus().peripheral().register(SPEED_REG),
            full.bus().peripheral().register(SPEED_REG)
        );
    }

    #[test]
    fn test_get_speed_after_set_speed_tracks_target() {
        let mut fan = driver(bench_config());
        for target in [40, 50, 60, 75, 90, 100] {
            let actual = fan.set_speed(target).unwrap();
            let measured = fan.get_speed().unwrap();
            assert_eq!(actual, measured);
            assert!(
                measured.abs_diff(target) <= 2,
                "target {}% measured {}%",
                target,
                measured
            );
        }
    }

    #[test]
    fn test_set_speed_write_failure() {
        let mut fan = driver(bench_config());
        fan.bus_mut().peripheral_mut().fail_next(1);
        assert!(matches!(fan.set_speed(50), Err(FanconError::Bus(_))));
        assert_eq!(fan.bus().recoveries(), 1);
    }

    #[test]
    fn test_get_speed_reports_read_failure() {
        // A failed tachometer read must not look like a measurement
        let mut fan = driver(bench_config());
        fan.bus_mut().peripheral_mut().fail_next(1);
        assert!(matches!(fan.get_speed(), Err(FanconError::Bus(_))));
    }

    #[test]
    fn test_set_speed_fails_when_readback_fails() {
        let mut fan = driver(bench_config());
        // Speed write succeeds, tachometer read fails
        fan.bus_mut().peripheral_mut().fail_transfers_after(1, 1);
        assert!(fan.set_speed(50).is_err());
        assert_eq!(fan.bus().peripheral().register(SPEED_REG), 157);
    }

    #[test]
    fn test_reconfigure_replaces_state_on_success() {
        let mut fan = driver(bench_config());
        let new_config = FanControllerConfig {
            k_scale: KScale::X8,
            rpm_max: 6000,
            ..bench_config()
        };
        fan.reconfigure(new_config).unwrap();
        assert_eq!(fan.config(), &new_config);
        assert_eq!(fan.bus().peripheral().register(CONFIG_REG), 0b0010_1011);
    }

    #[test]
    fn test_reconfigure_keeps_old_state_on_failure() {
        let mut fan = driver(bench_config());
        let moved = FanControllerConfig {
            address_line: AddressLine::Vcc,
            ..bench_config()
        };
        assert!(fan.reconfigure(moved).is_err());
        assert_eq!(fan.address(), 0x90);
        assert_eq!(fan.config(), &bench_config());

        let invalid = FanControllerConfig {
            rpm_max: 10,
            ..bench_config()
        };
        assert!(matches!(
            fan.reconfigure(invalid),
            Err(FanconError::InvalidInput(_))
        ));
        assert_eq!(fan.config(), &bench_config());
    }

    #[test]
    fn test_probe() {
        let mut fan = driver(bench_config());
        assert!(fan.probe(3).is_ok());
    }
}
