mod alerts;
mod amount;
mod endpoints;
mod env;
mod eth;
mod log;
mod rpc;
mod watch;

pub use alerts::{alert_message, SendAlert, WebhookAlerts};
pub use amount::{Amount, AmountError};
pub use endpoints::{load_endpoints, parse_endpoints, ConfigError, Endpoint};
pub use eth::{
    address_data_hex, balance_of_params, decode_quantity, encode_balance_of_call,
    normalize_address, AddressError, QuantityError, USDC_CONTRACT,
};
pub use rpc::{
    AttemptError, CallError, ClientError, HttpTransport, RawResponse, RpcClient, Transport,
};
pub use watch::{start_watcher, StopReason, WatchSettings, Watcher};
