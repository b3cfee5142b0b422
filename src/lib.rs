// Vital-sign classification and simulation
pub mod vitals;

// Live patient state
pub mod state;

// Alert throttling
pub mod alert;

// Buffering of records pending persistence
pub mod batch;

// Durable storage
pub mod store;

// Patient roster sources
pub mod roster;

// Injectable time source
pub mod clock;

// Live snapshot broadcasting
pub mod broadcast;

// NATS snapshot sink
pub mod nats;

// Tick loop
pub mod scheduler;

// Configuration
pub mod config;

// HTTP and WebSocket status APIs
pub mod api;

// WebSocket subscription management
pub mod subscription;
