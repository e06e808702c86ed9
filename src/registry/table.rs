//! The fixed topic table.

use super::{
    Group, TopicEntry, FEED_ATTIC_MOTION, TOPIC_LOCAL_CMD, TOPIC_RANDOMIZER, TOPIC_RING_CMD,
    TOPIC_WEATHER_CURRENT,
};

const TEMP: &[Group] = &[Group::HomeTemperature];
const HUMIDITY: &[Group] = &[Group::HomeHumidity];
const LUX: &[Group] = &[Group::HomeLux];
const MOTION: &[Group] = &[Group::HomeMotion];
const ZONE: &[Group] = &[Group::HomeZone];
const ELECTRIC: &[Group] = &[Group::ElectricMeters];
const UPTIME: &[Group] = &[Group::DeviceUptime];
const MEMORY: &[Group] = &[Group::DeviceFreeMemory];
const DEVICE_STATUS: &[Group] = &[Group::DeviceUptime, Group::DeviceFreeMemory];

/// Topics published on the local broker and relayed to the cloud.
pub const LOCAL_ENTRIES: &[TopicEntry] = &[
    TopicEntry::new(TOPIC_LOCAL_CMD, &[Group::LocalCommand], "local-cmd"),
    TopicEntry::new(TOPIC_RING_CMD, &[Group::RingCommand], "ring-mqtt-cmd"),
    TopicEntry::new("/openweather/temp_min", TEMP, "minimum"),
    TopicEntry::new("/openweather/temp_max", TEMP, "maximum"),
    TopicEntry::new("/sensor/temperature_outside", TEMP, "outside"),
    TopicEntry::new("/sensor/temperature_house", TEMP, "living-room"),
    TopicEntry::new("/attic/temperature", TEMP, "attic"),
    TopicEntry::new("/basement_window/temperature", TEMP, "basement"),
    TopicEntry::new("/dining_room/temperature", TEMP, "dining-room"),
    TopicEntry::new("/master_bedroom/temperature", TEMP, "master-bedroom"),
    TopicEntry::new("/garage/temperature", TEMP, "garage"),
    TopicEntry::new("/pyportalhallway/temperature", TEMP, "pyportal-hallway"),
    TopicEntry::new("/pyportalkitchen/temperature", TEMP, "pyportal-kitchen"),
    TopicEntry::new(
        "zwave/shed/sensor_multilevel/endpoint_0/Air_temperature",
        TEMP,
        "shed",
    ),
    TopicEntry::new("/attic/humidity", HUMIDITY, "attic"),
    TopicEntry::new("/basement_window/humidity", HUMIDITY, "basement"),
    TopicEntry::new("/dining_room/humidity", HUMIDITY, "dining-room"),
    TopicEntry::new("/master_bedroom/humidity", HUMIDITY, "master-bedroom"),
    TopicEntry::new("/garage/humidity", HUMIDITY, "garage"),
    TopicEntry::new(
        "zwave/shed/sensor_multilevel/endpoint_0/Humidity",
        HUMIDITY,
        "shed",
    ),
    TopicEntry::new("/attic/light", LUX, "attic"),
    TopicEntry::new("/garage/light", LUX, "garage"),
    TopicEntry::new("/officeClock/light", LUX, "office"),
    TopicEntry::new("/basement_window/light", LUX, "basement"),
    TopicEntry::new("/pyportalhallway/light", LUX, "pyportal-hallway"),
    TopicEntry::new("/pyportalkitchen/light", LUX, "pyportal-kitchen"),
    TopicEntry::new(
        "zwave/shed/sensor_multilevel/endpoint_0/Illuminance",
        LUX,
        "shed",
    ),
    TopicEntry::new("/pyportalhallway/status", DEVICE_STATUS, "pyportal-hallway"),
    TopicEntry::new("/pyportalkitchen/status", DEVICE_STATUS, "pyportal-kitchen"),
    TopicEntry::new("/kitchen_clock/status", DEVICE_STATUS, "kitchen-clock"),
    TopicEntry::new("/dining_room/oper_uptime_minutes", UPTIME, "dining-room"),
    TopicEntry::new("/basement_window/oper_uptime_minutes", UPTIME, "basement"),
    TopicEntry::new("/master_bedroom/oper_uptime_minutes", UPTIME, "master-bedroom"),
    TopicEntry::new("/attic/oper_uptime_minutes", UPTIME, "attic"),
    TopicEntry::new("/buttonbox2/uptime", UPTIME, "trellis-office"),
    TopicEntry::new("/buttonbox2/memory", MEMORY, "trellis-office"),
    // Attic motion goes out through the cloud and comes back as a remote entry.
    TopicEntry::new("/garage/oper_flag/motion", MOTION, "garage"),
    TopicEntry::new("/garage_steps/oper_flag/motion", MOTION, "garage"),
    TopicEntry::new("/kitchen_steps/oper_flag/motion", MOTION, "garage"),
    TopicEntry::new("/motionbox1/oper_flag/motion", MOTION, "basement"),
    TopicEntry::new("/officeClock/motion", MOTION, "office"),
    TopicEntry::new(
        "zwave/shed/notification/endpoint_0/Home_Security/Motion_sensor_status",
        MOTION,
        "shed",
    ),
    TopicEntry::new("/garage_door/zelda", ZONE, "garage-east"),
    TopicEntry::new("/garage_door/zen", ZONE, "garage-west"),
    TopicEntry::new("/ring/zone/#", ZONE, ""),
    TopicEntry::new("/ring/motion/#", MOTION, ""),
    TopicEntry::new("/ring/contact/#", ZONE, ""),
    TopicEntry::new("/zwave/waterpump/watts", ELECTRIC, "water-pump-power"),
    TopicEntry::new("/zwave/waterpump/kwh", ELECTRIC, "water-pump"),
    TopicEntry::new("/zwave/minisplit/watts", ELECTRIC, "mini-split-power"),
    TopicEntry::new("/zwave/minisplit/kwh", ELECTRIC, "mini-split"),
    TopicEntry::new("/electric_meter/#", ELECTRIC, ""),
    TopicEntry::new("/electric_meter_baseline/#", &[Group::BaselineElectric], ""),
    TopicEntry::new("/sense/data/#", ELECTRIC, ""),
    TopicEntry::new("/sense/device/#", &[Group::HomeDevice], ""),
    TopicEntry::new("/solar_rate/#", &[Group::SolarRate], ""),
];

/// Feeds pushed by the cloud and relayed to the local broker.
pub const REMOTE_ENTRIES: &[TopicEntry] = &[
    TopicEntry::new("/attic/motion", MOTION, FEED_ATTIC_MOTION),
    TopicEntry::new(TOPIC_RANDOMIZER, &[Group::Randomizer], "words"),
    TopicEntry::new(TOPIC_WEATHER_CURRENT, &[Group::Weather], "current"),
];
