pub mod kafka;
pub mod producer;
pub mod sink;

pub use kafka::KafkaSink;
pub use producer::BrokerProducer;
