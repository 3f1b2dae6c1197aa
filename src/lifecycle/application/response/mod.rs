pub mod instance_price;
