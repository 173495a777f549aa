pub const TOPIC_STATUS: &str = "thermostat/status";
pub const TOPIC_TARGET: &str = "thermostat/target";
pub const TOPIC_MODE: &str = "thermostat/mode";
pub const TOPIC_FURNACE: &str = "thermostat/furnace";
pub const TOPIC_AC: &str = "thermostat/ac";
pub const TOPIC_FAN: &str = "thermostat/fan";
pub const TOPIC_ERROR: &str = "thermostat/error";
pub const TOPIC_TEMPERATURE: &str = "sensors/temperature/thermostat";

pub const TOPIC_CMD_TARGET: &str = "thermostat/target/set";
pub const TOPIC_CMD_MODE: &str = "thermostat/mode/set";
pub const TOPIC_CMD_FAN: &str = "thermostat/fan/set";

pub const STATUS_STARTED: &str = "Started";
pub const STATUS_STOPPED: &str = "Stopped";
