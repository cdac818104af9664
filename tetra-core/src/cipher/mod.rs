//! Stream cipher implementations used on TETRA traffic channels.

pub mod tea1;

pub use tea1::Tea1Context;
