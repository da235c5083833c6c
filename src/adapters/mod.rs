//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to               |
//! |----------------|--------------------|---------------------------|
//! | `hardware`     | SensorPort         | DHT22, soil ADC, BH1750   |
//! |                | ResetInputPort     | BOOT button GPIO          |
//! | `http`         | HttpPort           | ESP-IDF HTTP client       |
//! | `log_sink`     | EventSink          | Serial log output         |
//! | `mqtt`         | BrokerPort         | esp-mqtt over TLS         |
//! | `nvs`          | ConfigPort         | NVS / in-memory store     |
//! |                | StoragePort        |                           |
//! | `time`         | SystemPort         | ESP32 timer, reset        |
//! | `wifi`         | LinkPort           | ESP-IDF WiFi STA + portal |
//! | `cert_store`   | -                  | Pinned broker CA          |
//! | `device_id`    | -                  | Station MAC               |

pub mod cert_store;
pub mod device_id;
pub mod hardware;
pub mod http;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub mod wifi;
