use serde::Serialize;

const HOURS_PER_MONTH: f64 = 24.0 * 30.0;

/// Price of an instance sizing in a zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePrice {
    /// Hourly price of the CPU share.
    pub cpu: f64,
    /// Hourly price of the RAM share.
    pub ram: f64,
    pub total_hourly: f64,
    /// Hourly total over a 30-day month.
    pub total_monthly: f64,
}

impl InstancePrice {
    pub fn from_unit_prices(cpu_unit: f64, cpu: u32, ram_unit: f64, ram: u32) -> Self {
        let cpu = cpu_unit * f64::from(cpu);
        let ram = ram_unit * f64::from(ram);
        let total_hourly = cpu + ram;
        Self {
            cpu,
            ram,
            total_hourly,
            total_monthly: total_hourly * HOURS_PER_MONTH,
        }
    }
}
