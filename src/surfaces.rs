//! Moving parts of the airframe model. A front end resolves its scene node
//! names once through [`SURFACE_TABLE`], then asks for per-tick poses by
//! stable handle instead of searching its node tree every frame.

use crate::flight::Vehicle;
use cgmath::Vector3;
use std::f32::consts::FRAC_PI_2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurfaceKind {
    Elevator,
    AileronLeft,
    AileronRight,
    Rudder,
    ControlStick,
    BrakeTop,
    BrakeBottom,
    BrakeHandle,
    GearWheel,
    GearDoorLeft,
    GearDoorRight,
    GearHandle,
}

impl SurfaceKind {
    pub const ALL: [SurfaceKind; 12] = [
        SurfaceKind::Elevator,
        SurfaceKind::AileronLeft,
        SurfaceKind::AileronRight,
        SurfaceKind::Rudder,
        SurfaceKind::ControlStick,
        SurfaceKind::BrakeTop,
        SurfaceKind::BrakeBottom,
        SurfaceKind::BrakeHandle,
        SurfaceKind::GearWheel,
        SurfaceKind::GearDoorLeft,
        SurfaceKind::GearDoorRight,
        SurfaceKind::GearHandle,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// Node name in the airframe model for every surface kind.
pub const SURFACE_TABLE: &[(&str, SurfaceKind)] = &[
    ("Elevator", SurfaceKind::Elevator),
    ("AileronL", SurfaceKind::AileronLeft),
    ("AileronR", SurfaceKind::AileronRight),
    ("Rudder", SurfaceKind::Rudder),
    ("ControlStick", SurfaceKind::ControlStick),
    ("BrakeTop", SurfaceKind::BrakeTop),
    ("BrakeBottom", SurfaceKind::BrakeBottom),
    ("BrakeHandle", SurfaceKind::BrakeHandle),
    ("WheelF", SurfaceKind::GearWheel),
    ("LandingGearDoorL", SurfaceKind::GearDoorLeft),
    ("LandingGearDoorR", SurfaceKind::GearDoorRight),
    ("LandingGearHandle", SurfaceKind::GearHandle),
];

pub fn kind_for_name(name: &str) -> Option<SurfaceKind> {
    SURFACE_TABLE
        .iter()
        .find(|(entry, _)| *entry == name)
        .map(|&(_, kind)| kind)
}

/// Position of a node in the caller's node list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub usize);

/// Offset from the rest pose: a translation plus XYZ Euler angles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfacePose {
    pub translation: Vector3<f32>,
    pub rotation: Vector3<f32>,
}

impl SurfacePose {
    fn translated(x: f32, y: f32, z: f32) -> Self {
        Self {
            translation: Vector3::new(x, y, z),
            rotation: Vector3::new(0.0, 0.0, 0.0),
        }
    }

    fn rotated(x: f32, y: f32, z: f32) -> Self {
        Self {
            translation: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(x, y, z),
        }
    }
}

pub fn pose_for(kind: SurfaceKind, vehicle: &Vehicle) -> SurfacePose {
    let [elevator, aileron, rudder] = vehicle.deflection;
    let brake = vehicle.brake_position;
    let gear = vehicle.gear_position;
    match kind {
        SurfaceKind::Elevator => SurfacePose::rotated(elevator * -0.3, 0.0, 0.0),
        SurfaceKind::AileronLeft => SurfacePose::rotated(0.0, 0.0, aileron * -0.5),
        SurfaceKind::AileronRight => SurfacePose::rotated(0.0, 0.0, aileron * 0.5),
        SurfaceKind::Rudder => SurfacePose::rotated(0.0, 0.0, rudder * 0.3),
        SurfaceKind::ControlStick => SurfacePose::rotated(elevator * 0.3, aileron * 0.3, 0.0),
        SurfaceKind::BrakeTop => SurfacePose::translated(0.0, 0.0, brake * 0.1),
        SurfaceKind::BrakeBottom => SurfacePose::translated(0.0, 0.0, brake * -0.1),
        SurfaceKind::BrakeHandle => SurfacePose::translated(0.0, brake * -0.2, 0.0),
        SurfaceKind::GearWheel => SurfacePose::translated(0.0, 0.0, gear * -0.2),
        SurfaceKind::GearDoorLeft => SurfacePose::rotated(0.0, gear * FRAC_PI_2, 0.0),
        SurfaceKind::GearDoorRight => SurfacePose::rotated(0.0, gear * -FRAC_PI_2, 0.0),
        SurfaceKind::GearHandle => SurfacePose::translated(0.0, gear * -0.2, 0.0),
    }
}

/// Handles of the surfaces present in one airframe model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceRig {
    handles: [Option<NodeHandle>; SurfaceKind::ALL.len()],
}

impl SurfaceRig {
    /// Walks the node names once. The first node carrying a known name wins;
    /// unknown names are ignored.
    pub fn resolve<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut rig = Self::default();
        for (position, name) in names.into_iter().enumerate() {
            if let Some(kind) = kind_for_name(name) {
                rig.handles[kind.slot()].get_or_insert(NodeHandle(position));
            }
        }
        let missing = rig.missing().count();
        if missing > 0 {
            log::warn!("airframe model lacks {missing} control surface node(s)");
        }
        rig
    }

    pub fn handle(&self, kind: SurfaceKind) -> Option<NodeHandle> {
        self.handles[kind.slot()]
    }

    pub fn missing(&self) -> impl Iterator<Item = SurfaceKind> + '_ {
        SurfaceKind::ALL
            .into_iter()
            .filter(|kind| self.handles[kind.slot()].is_none())
    }

    /// Current pose of every resolved surface.
    pub fn poses(&self, vehicle: &Vehicle) -> Vec<(NodeHandle, SurfacePose)> {
        SurfaceKind::ALL
            .into_iter()
            .filter_map(|kind| Some((self.handle(kind)?, pose_for(kind, vehicle))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlightParams;
    use cgmath::Point3;

    #[test]
    fn table_covers_every_kind_once() {
        for kind in SurfaceKind::ALL {
            assert_eq!(SURFACE_TABLE.iter().filter(|(_, k)| *k == kind).count(), 1);
        }
        assert_eq!(kind_for_name("WheelF"), Some(SurfaceKind::GearWheel));
        assert_eq!(kind_for_name("Canopy"), None);
    }

    #[test]
    fn rig_resolves_handles_by_position() {
        let names = ["Fuselage", "Elevator", "AileronL", "Elevator", "LandingGearDoorR"];
        let rig = SurfaceRig::resolve(names);
        assert_eq!(rig.handle(SurfaceKind::Elevator), Some(NodeHandle(1)));
        assert_eq!(rig.handle(SurfaceKind::AileronLeft), Some(NodeHandle(2)));
        assert_eq!(rig.handle(SurfaceKind::GearDoorRight), Some(NodeHandle(4)));
        assert_eq!(rig.handle(SurfaceKind::Rudder), None);
        assert_eq!(rig.missing().count(), SurfaceKind::ALL.len() - 3);
    }

    #[test]
    fn poses_follow_deflections_and_gear() {
        let mut vehicle = Vehicle::new(Point3::new(0.0, 0.0, 0.0), &FlightParams::default());
        vehicle.deflection = [1.0, -1.0, 0.5];
        vehicle.gear_position = 1.0;
        vehicle.brake_position = 0.5;

        let rig = SurfaceRig::resolve(SURFACE_TABLE.iter().map(|(name, _)| *name));
        let poses = rig.poses(&vehicle);
        assert_eq!(poses.len(), SurfaceKind::ALL.len());

        let elevator = pose_for(SurfaceKind::Elevator, &vehicle);
        assert!((elevator.rotation.x + 0.3).abs() < 1e-6);
        let left = pose_for(SurfaceKind::AileronLeft, &vehicle);
        let right = pose_for(SurfaceKind::AileronRight, &vehicle);
        assert_eq!(left.rotation.z, -right.rotation.z);
        let door = pose_for(SurfaceKind::GearDoorRight, &vehicle);
        assert!((door.rotation.y + FRAC_PI_2).abs() < 1e-6);
        let brake = pose_for(SurfaceKind::BrakeTop, &vehicle);
        assert!((brake.translation.z - 0.05).abs() < 1e-6);
    }
}
