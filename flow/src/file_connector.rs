//! File connector: opens a [`flow_shunt::file::FileShunt`] and wraps it as
//! a [`Connector`].

use std::path::Path;

use flow_shunt::error::Result as ShuntResult;
use flow_shunt::file::FileShunt;
use flow_shunt::options::ShuntOptions;

use crate::connector::{Connector, ConnectivityMonitor};

pub struct FileConnector;

impl FileConnector {
    pub fn open_read(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        options: ShuntOptions,
    ) -> ShuntResult<(Connector, ConnectivityMonitor)> {
        let name = name.into();
        let shunt = FileShunt::open_read(&name, path, options)?;
        Ok(Connector::new(name, Box::new(shunt)))
    }

    pub fn open(
        name: impl Into<String>,
        op: &flow_core::event::FileConnectOp,
        options: ShuntOptions,
    ) -> ShuntResult<(Connector, ConnectivityMonitor)> {
        let name = name.into();
        let shunt = FileShunt::open(&name, op, options)?;
        Ok(Connector::new(name, Box::new(shunt)))
    }
}
