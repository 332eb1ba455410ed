//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter  | Implements                        | Connects to                |
//! |----------|-----------------------------------|----------------------------|
//! | `ble`    | CommandChannel                    | Bluedroid GATT server      |
//! | `http`   | HttpPort                          | ESP-IDF HTTP client        |
//! | `nvs`    | StoragePort                       | NVS / in-memory store      |
//! | `radio`  | RadioPort                         | SX1276 on SPI2 / sim queue |
//! | `time`   | ClockPort                         | SNTP-synced system clock   |
//! | `wifi`   | NetworkPort                       | ESP-IDF WiFi STA           |
//! |          | ScanPort, PeripheralPort          |                            |

pub mod ble;
pub mod http;
pub mod nvs;
pub mod radio;
pub mod time;
pub mod wifi;
