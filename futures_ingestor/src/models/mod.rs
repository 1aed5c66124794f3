pub mod contract;
pub mod price_series;
pub mod reference;
pub mod request_params;
