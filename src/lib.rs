/*!
    host side of the eDAQS data-acquisition nodes sitting on a shared rs485 bus.

    each node pairs a gateway controller (owning the bus link) with a sampling controller recording into a circular memory. The crate is layered as follow

    - [frame] encodes and decodes the delimited text frames of the bus, on both ends of the link
    - [registers], [trigger], [selection] and [sample] hold the device-variant tables and the pure arithmetic of buffer retrieval, they are `no_std`
    - `host` (feature `host`) talks to real nodes over a serial port: link, gateway, register file, trigger control and sample store
    - `sim` (feature `sim`) simulates nodes in-process, for testing without hardware
*/
#![cfg_attr(not(test), no_std)]
#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod frame;
pub mod registers;
pub mod trigger;
pub mod selection;
pub mod sample;

#[cfg(feature = "host")]
pub mod host;
#[cfg(feature = "sim")]
pub mod sim;
