//! Text formatting for display consumers.
//!
//! A display resolves the objects it shows read-only, every refresh, and
//! renders whatever it finds. Anything that can't be resolved or has no
//! valid value is shown as a placeholder.

use cbox_object::{ObjectLookup, ProcessValue, Temp, TempSensor};
use cbox_registry::CboxPtr;
use cbox_types::Ticks;

pub const TEMP_PLACEHOLDER: &str = "--.-";
pub const VALUE_PLACEHOLDER: &str = "-";

/// Render a temperature with one decimal, rounded half away from zero.
pub fn format_temp(temp: Option<Temp>) -> String {
    let Some(t) = temp else {
        return TEMP_PLACEHOLDER.to_string();
    };
    let t = i64::from(t);
    let tenths = (t + if t >= 0 { 50 } else { -50 }) / 100;
    let sign = if tenths < 0 { "-" } else { "" };
    let abs = tenths.abs();
    format!("{sign}{}.{}", abs / 10, abs % 10)
}

/// Render a duration in the largest sensible units.
pub fn format_duration(duration: Option<Ticks>) -> String {
    let Some(ms) = duration else {
        return VALUE_PLACEHOLDER.to_string();
    };
    let secs = ms / 1_000;
    match ms {
        0..=999 => format!("{ms}ms"),
        1_000..=59_999 => format!("{secs}s"),
        60_000..=3_599_999 => format!("{}m {}s", secs / 60, secs % 60),
        _ => format!("{}h {}m", secs / 3_600, (secs / 60) % 60),
    }
}

/// Current reading of a linked sensor.
pub fn sensor_text(links: &dyn ObjectLookup, sensor: CboxPtr<dyn TempSensor>) -> String {
    format_temp(sensor.resolve(links).and_then(|s| s.value()))
}

/// `(setting, value)` of a linked process value.
pub fn process_value_text(
    links: &dyn ObjectLookup,
    pv: CboxPtr<dyn ProcessValue>,
) -> (String, String) {
    match pv.resolve(links) {
        Some(pv) => (format_temp(pv.setting()), format_temp(pv.value())),
        None => (format_temp(None), format_temp(None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setpoint_sensor_pair::SetpointSensorPairBlock;
    use crate::temp_sensor_mock::TempSensorMockBlock;
    use cbox_object::NoLinks;
    use cbox_registry::Container;
    use cbox_types::ObjectId;

    #[test]
    fn temperatures() {
        assert_eq!(format_temp(None), "--.-");
        assert_eq!(format_temp(Some(21_500)), "21.5");
        assert_eq!(format_temp(Some(21_549)), "21.5");
        assert_eq!(format_temp(Some(21_550)), "21.6");
        assert_eq!(format_temp(Some(0)), "0.0");
        assert_eq!(format_temp(Some(-40)), "0.0");
        assert_eq!(format_temp(Some(-50)), "-0.1");
        assert_eq!(format_temp(Some(-1_234)), "-1.2");
        assert_eq!(format_temp(Some(i32::MIN)), "-2147483.6");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(None), "-");
        assert_eq!(format_duration(Some(250)), "250ms");
        assert_eq!(format_duration(Some(4_000)), "4s");
        assert_eq!(format_duration(Some(65_000)), "1m 5s");
        assert_eq!(format_duration(Some(3_723_000)), "1h 2m");
    }

    #[test]
    fn resolves_read_only_and_falls_back_to_placeholders() {
        let mut c = Container::new(ObjectId::new(100));
        c.insert_with_id(ObjectId::new(100), Box::new(TempSensorMockBlock::new(19_000)))
            .unwrap();
        c.insert_with_id(
            ObjectId::new(101),
            Box::new(SetpointSensorPairBlock::new(ObjectId::new(100), 20_000)),
        )
        .unwrap();
        c.update_all(0);

        assert_eq!(sensor_text(&c, CboxPtr::new(ObjectId::new(100))), "19.0");
        assert_eq!(
            process_value_text(&c, CboxPtr::new(ObjectId::new(101))),
            ("20.0".to_string(), "19.0".to_string())
        );
        // wrong capability and missing object look the same
        assert_eq!(sensor_text(&c, CboxPtr::new(ObjectId::new(101))), "--.-");
        assert_eq!(sensor_text(&NoLinks, CboxPtr::new(ObjectId::new(100))), "--.-");
    }
}
