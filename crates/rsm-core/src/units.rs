// rsm-core/src/units.rs

use uom::si::f64::{
    AngularVelocity as UomAngularVelocity, ElectricCurrent as UomElectricCurrent,
    ElectricPotential as UomElectricPotential, ElectricalResistance as UomElectricalResistance,
    MagneticFlux as UomMagneticFlux, Time as UomTime,
};

// Public canonical unit types (SI, f64)
pub type AngularVelocity = UomAngularVelocity;
pub type Current = UomElectricCurrent;
pub type FluxLinkage = UomMagneticFlux;
pub type Resistance = UomElectricalResistance;
pub type Time = UomTime;
pub type Voltage = UomElectricPotential;

#[inline]
pub fn amp(v: f64) -> Current {
    use uom::si::electric_current::ampere;
    Current::new::<ampere>(v)
}

#[inline]
pub fn volt(v: f64) -> Voltage {
    use uom::si::electric_potential::volt;
    Voltage::new::<volt>(v)
}

#[inline]
pub fn ohm(v: f64) -> Resistance {
    use uom::si::electrical_resistance::ohm;
    Resistance::new::<ohm>(v)
}

#[inline]
pub fn rad_per_s(v: f64) -> AngularVelocity {
    use uom::si::angular_velocity::radian_per_second;
    AngularVelocity::new::<radian_per_second>(v)
}

#[inline]
pub fn weber(v: f64) -> FluxLinkage {
    use uom::si::magnetic_flux::weber;
    FluxLinkage::new::<weber>(v)
}

#[inline]
pub fn s(v: f64) -> Time {
    use uom::si::time::second;
    Time::new::<second>(v)
}

/// Raw SI magnitudes for handing quantities to the expression graph.
pub mod raw {
    use super::*;

    #[inline]
    pub fn amps(i: Current) -> f64 {
        i.get::<uom::si::electric_current::ampere>()
    }

    #[inline]
    pub fn volts(u: Voltage) -> f64 {
        u.get::<uom::si::electric_potential::volt>()
    }

    #[inline]
    pub fn ohms(r: Resistance) -> f64 {
        r.get::<uom::si::electrical_resistance::ohm>()
    }

    #[inline]
    pub fn rad_s(w: AngularVelocity) -> f64 {
        w.get::<uom::si::angular_velocity::radian_per_second>()
    }

    #[inline]
    pub fn webers(psi: FluxLinkage) -> f64 {
        psi.get::<uom::si::magnetic_flux::weber>()
    }

    #[inline]
    pub fn seconds(t: Time) -> f64 {
        t.get::<uom::si::time::second>()
    }
}
