//! Index server lifecycle: startup, rebuild, live updates and shutdown
