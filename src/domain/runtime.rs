pub mod train_snapshot;
