// Endpoint groups, one file per appliance resource. Each file adds
// inherent methods to `OpnClient`.

mod dhcp;
mod firewall;
mod interfaces;
mod system;
mod vlans;

pub use dhcp::NON_SCOPE_KEYS;
