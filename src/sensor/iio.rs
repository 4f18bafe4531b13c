//! Linux industrial-I/O back-end. Ambient light sensors show up under
//! `/sys/bus/iio/devices/iio:deviceN/` as `in_illuminance_*` attributes.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use super::{
    poller::PollerHandle, unknown_sensor, Accuracy, Listener, ListenerId, SamplingRate, Sensor,
    SensorBroker, SensorEvent, SensorHandle, SensorKind, SensorMessage,
};
use crate::{Error, Result};

pub const DEFAULT_IIO_ROOT: &str = "/sys/bus/iio/devices";

const DEVICE_PREFIX: &str = "iio:device";

/// Attribute prefixes per sensor kind, most specific last.
const CHANNEL_PREFIXES: [(SensorKind, [&str; 2]); 2] = [
    (SensorKind::Light, ["in_illuminance", "in_illuminance0"]),
    (SensorKind::Proximity, ["in_proximity", "in_proximity0"]),
];

/// Where a channel's value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSource {
    /// Already in final units (`*_input`).
    Processed(PathBuf),
    /// `(raw + offset) * scale`.
    Raw {
        raw: PathBuf,
        scale: Option<PathBuf>,
        offset: Option<PathBuf>,
    },
}

#[derive(Debug, Clone)]
struct IioChannel {
    sensor: Sensor,
    source: ChannelSource,
}

/// Sensor broker backed by IIO sysfs attributes, polled on a thread per
/// registration.
pub struct IioBroker {
    root: PathBuf,
    channels: Vec<IioChannel>,
    pollers: HashMap<ListenerId, PollerHandle>,
}

impl IioBroker {
    pub fn new() -> Result<Self> {
        Self::with_root(DEFAULT_IIO_ROOT)
    }

    /// Scan `root` for devices. A missing root yields a broker with no sensors.
    pub fn with_root(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let channels = scan(&root)?;
        log::debug!(
            "iio scan of {} found {} channel(s)",
            root.display(),
            channels.len()
        );
        Ok(Self {
            root,
            channels,
            pollers: HashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the current value of `sensor` once, outside any registration.
    pub fn read_now(&self, sensor: &Sensor) -> Result<f32> {
        let channel = self.channel(sensor)?;
        read_value(&channel.source, channel.sensor.kind)
    }

    fn channel(&self, sensor: &Sensor) -> Result<&IioChannel> {
        self.channels
            .iter()
            .find(|c| c.sensor.handle == sensor.handle)
            .ok_or_else(|| unknown_sensor(sensor))
    }
}

impl SensorBroker for IioBroker {
    fn default_sensor(&self, kind: SensorKind) -> Option<Sensor> {
        self.channels
            .iter()
            .find(|c| c.sensor.kind == kind)
            .map(|c| c.sensor.clone())
    }

    fn register_listener(
        &mut self,
        id: ListenerId,
        sensor: &Sensor,
        rate: SamplingRate,
        mut listener: Listener,
    ) -> Result<()> {
        let channel = self.channel(sensor)?.clone();
        if let Some(mut previous) = self.pollers.remove(&id) {
            previous.stop();
        }

        let kind = channel.sensor.kind;
        let name = channel.sensor.name.clone();
        let source = channel.source;
        let mut last: Option<f32> = None;
        let mut failing = false;
        let poller = PollerHandle::spawn(
            &format!("luxmeter-iio-{}", channel.sensor.handle.0),
            rate.poll_interval(),
            move |elapsed| match read_value(&source, kind) {
                Ok(value) => {
                    if failing {
                        log::info!("iio {name}: readings recovered");
                        failing = false;
                    }
                    if last != Some(value) {
                        last = Some(value);
                        listener(SensorMessage::Reading(SensorEvent {
                            kind,
                            values: vec![value],
                            accuracy: Accuracy::High,
                            timestamp_ns: elapsed.as_nanos() as u64,
                        }));
                    }
                }
                Err(err) => {
                    if !failing {
                        log::warn!("iio {name}: read failed: {err}");
                        failing = true;
                    }
                }
            },
        )?;
        log::debug!(
            "iio: listener {} registered on {} at {rate}",
            id.0,
            sensor.name
        );
        self.pollers.insert(id, poller);
        Ok(())
    }

    fn unregister_listener(&mut self, id: ListenerId) {
        if let Some(mut poller) = self.pollers.remove(&id) {
            poller.stop();
            log::debug!("iio: listener {} unregistered", id.0);
        }
    }

    fn sensors(&self) -> Vec<Sensor> {
        self.channels.iter().map(|c| c.sensor.clone()).collect()
    }
}

fn scan(root: &Path) -> Result<Vec<IioChannel>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(Error::Io(err)),
    };

    let mut devices: Vec<(u32, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(index) = file_name
            .to_str()
            .and_then(|n| n.strip_prefix(DEVICE_PREFIX))
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };
        devices.push((index, entry.path()));
    }
    devices.sort_by_key(|(index, _)| *index);

    let mut channels = Vec::new();
    for (index, dir) in devices {
        let name = fs::read_to_string(dir.join("name"))
            .map(|n| n.trim().to_string())
            .ok()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{DEVICE_PREFIX}{index}"));
        for (kind, prefixes) in CHANNEL_PREFIXES {
            if let Some(source) = find_source(&dir, &prefixes) {
                let handle = SensorHandle(channels.len() as u32);
                channels.push(IioChannel {
                    sensor: Sensor {
                        handle,
                        kind,
                        name: name.clone(),
                    },
                    source,
                });
            }
        }
    }
    Ok(channels)
}

fn find_source(dir: &Path, prefixes: &[&str]) -> Option<ChannelSource> {
    let attr = |prefix: &str, suffix: &str| {
        let path = dir.join(format!("{prefix}_{suffix}"));
        path.is_file().then_some(path)
    };
    // Shared attributes may be published without the channel index.
    let shared = |suffix: &str| prefixes.iter().find_map(|p| attr(p, suffix));

    for prefix in prefixes {
        if let Some(input) = attr(prefix, "input") {
            return Some(ChannelSource::Processed(input));
        }
        if let Some(raw) = attr(prefix, "raw") {
            return Some(ChannelSource::Raw {
                raw,
                scale: attr(prefix, "scale").or_else(|| shared("scale")),
                offset: attr(prefix, "offset").or_else(|| shared("offset")),
            });
        }
    }
    None
}

/// Read a channel value in final units.
pub fn read_value(source: &ChannelSource, kind: SensorKind) -> Result<f32> {
    let value = match source {
        ChannelSource::Processed(path) => read_number(path)?,
        ChannelSource::Raw { raw, scale, offset } => {
            let raw = read_number(raw)?;
            let scale = scale.as_deref().map(read_number).transpose()?.unwrap_or(1.0);
            let offset = offset
                .as_deref()
                .map(read_number)
                .transpose()?
                .unwrap_or(0.0);
            (raw + offset) * scale
        }
    };
    let value = if kind == SensorKind::Light {
        value.max(0.0)
    } else {
        value
    };
    Ok(value as f32)
}

fn read_number(path: &Path) -> Result<f64> {
    let raw = fs::read_to_string(path)?;
    raw.trim()
        .parse::<f64>()
        .map_err(|e| Error::Parse(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(root: &Path, index: u32, files: &[(&str, &str)]) -> PathBuf {
        let dir = root.join(format!("iio:device{index}"));
        fs::create_dir_all(&dir).unwrap();
        for (name, contents) in files {
            fs::write(dir.join(name), contents).unwrap();
        }
        dir
    }

    #[test]
    fn missing_root_has_no_sensors() {
        let tmp = tempfile::tempdir().unwrap();
        let broker = IioBroker::with_root(tmp.path().join("absent")).unwrap();
        assert!(broker.default_sensor(SensorKind::Light).is_none());
        assert!(broker.sensors().is_empty());
    }

    #[test]
    fn processed_input_is_used_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        device(
            tmp.path(),
            0,
            &[("name", "als\n"), ("in_illuminance_input", "42.5\n")],
        );
        let broker = IioBroker::with_root(tmp.path()).unwrap();
        let sensor = broker.default_sensor(SensorKind::Light).unwrap();
        assert_eq!(sensor.name, "als");
        assert_eq!(broker.read_now(&sensor).unwrap(), 42.5);
    }

    #[test]
    fn raw_channel_applies_offset_and_scale() {
        let tmp = tempfile::tempdir().unwrap();
        device(
            tmp.path(),
            0,
            &[
                ("in_illuminance0_raw", "100"),
                ("in_illuminance_scale", "0.5"),
                ("in_illuminance0_offset", "4"),
            ],
        );
        let broker = IioBroker::with_root(tmp.path()).unwrap();
        let sensor = broker.default_sensor(SensorKind::Light).unwrap();
        assert_eq!(sensor.name, "iio:device0");
        assert_eq!(broker.read_now(&sensor).unwrap(), 52.0);
    }

    #[test]
    fn negative_light_clamps_to_zero() {
        let tmp = tempfile::tempdir().unwrap();
        device(
            tmp.path(),
            0,
            &[("in_illuminance_raw", "2"), ("in_illuminance_offset", "-10")],
        );
        let broker = IioBroker::with_root(tmp.path()).unwrap();
        let sensor = broker.default_sensor(SensorKind::Light).unwrap();
        assert_eq!(broker.read_now(&sensor).unwrap(), 0.0);
    }

    #[test]
    fn devices_are_scanned_in_numeric_order() {
        let tmp = tempfile::tempdir().unwrap();
        device(
            tmp.path(),
            10,
            &[("name", "late"), ("in_illuminance_input", "1")],
        );
        device(
            tmp.path(),
            2,
            &[("name", "prox"), ("in_proximity_raw", "7")],
        );
        device(
            tmp.path(),
            3,
            &[("name", "early"), ("in_illuminance_input", "2")],
        );
        fs::create_dir_all(tmp.path().join("trigger0")).unwrap();

        let broker = IioBroker::with_root(tmp.path()).unwrap();
        let names: Vec<_> = broker.sensors().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["prox", "early", "late"]);
        assert_eq!(
            broker.default_sensor(SensorKind::Light).unwrap().name,
            "early"
        );
        assert_eq!(
            broker.default_sensor(SensorKind::Proximity).unwrap().name,
            "prox"
        );
        assert!(broker.default_sensor(SensorKind::Pressure).is_none());
    }

    #[test]
    fn unparsable_value_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        device(tmp.path(), 0, &[("in_illuminance_input", "bright")]);
        let broker = IioBroker::with_root(tmp.path()).unwrap();
        let sensor = broker.default_sensor(SensorKind::Light).unwrap();
        let err = broker.read_now(&sensor).unwrap_err();
        assert!(format!("{err}").contains("in_illuminance_input"));
    }

    #[test]
    fn unregister_without_registration_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let mut broker = IioBroker::with_root(tmp.path()).unwrap();
        broker.unregister_listener(ListenerId(1));
        broker.unregister_listener(ListenerId(1));
    }
}
