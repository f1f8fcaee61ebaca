pub mod date;
pub mod listing;
pub mod order;
pub mod owner;
pub mod product;
pub mod stats;
pub mod storefront;
pub mod supplier;
pub mod supplier_order;
pub mod window;
