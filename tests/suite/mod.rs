mod daemon_wire;
mod properties;
