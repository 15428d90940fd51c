//! Checks of the WGSL flocking kernel against the host-side layout.

use shoal::gpu::discover_kernel;
use shoal::shader::{FlockParams, KernelSlot, FLOCKING_SOURCE, KERNEL_ENTRY_POINT};

/// Validates WGSL code using naga.
fn validate_wgsl(code: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(code)
        .map_err(|e| format!("WGSL parse error: {:?}", e))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("WGSL validation error: {:?}", e))?;

    Ok(module)
}

fn global<'a>(module: &'a naga::Module, name: &str) -> &'a naga::GlobalVariable {
    module
        .global_variables
        .iter()
        .map(|(_, var)| var)
        .find(|var| var.name.as_deref() == Some(name))
        .unwrap_or_else(|| panic!("no global `{name}`"))
}

#[test]
fn test_kernel_validates() {
    validate_wgsl(FLOCKING_SOURCE).expect("Flocking kernel should be valid");
}

#[test]
fn test_kernel_entry_point() {
    let info = discover_kernel(FLOCKING_SOURCE, KERNEL_ENTRY_POINT).unwrap();
    assert_eq!(info.entry_point, "main");
    assert_eq!(info.workgroup_size, [64, 1, 1]);
}

#[test]
fn test_bindings_match_slots() {
    let module = validate_wgsl(FLOCKING_SOURCE).unwrap();
    for slot in KernelSlot::ALL {
        let var = global(&module, slot.wgsl_name());
        let binding = var.binding.as_ref().expect("resource binding");
        assert_eq!(binding.group, 0, "{:?}", slot);
        assert_eq!(binding.binding, slot.binding(), "{:?}", slot);

        let expected_space = if slot.is_uniform() {
            naga::AddressSpace::Uniform
        } else if slot.is_read_only() {
            naga::AddressSpace::Storage {
                access: naga::StorageAccess::LOAD,
            }
        } else {
            naga::AddressSpace::Storage {
                access: naga::StorageAccess::LOAD | naga::StorageAccess::STORE,
            }
        };
        assert_eq!(var.space, expected_space, "{:?}", slot);
    }
}

#[test]
fn test_snapshot_slots_are_read_only() {
    let read_only: Vec<KernelSlot> = KernelSlot::ALL
        .into_iter()
        .filter(|slot| slot.is_read_only())
        .collect();
    assert_eq!(
        read_only,
        vec![KernelSlot::PreviousPositions, KernelSlot::PreviousVelocities]
    );
}

#[test]
fn test_params_struct_matches_host_layout() {
    let module = validate_wgsl(FLOCKING_SOURCE).unwrap();
    let params = global(&module, KernelSlot::Params.wgsl_name());
    match &module.types[params.ty].inner {
        naga::TypeInner::Struct { members, span } => {
            assert_eq!(*span as usize, std::mem::size_of::<FlockParams>());
            let offsets: Vec<(&str, u32)> = members
                .iter()
                .map(|m| (m.name.as_deref().unwrap_or(""), m.offset))
                .collect();
            assert_eq!(
                offsets,
                vec![
                    ("speed_range", 0),
                    ("agent_count", 8),
                    ("max_steer_force", 12),
                    ("force_weight", 16),
                    ("delta_time", 28),
                    ("perception_radius", 32),
                    ("target_seek_force", 44),
                    ("target_position", 48),
                    ("target_clamp_distance", 60),
                ]
            );
        }
        other => panic!("params is not a struct: {:?}", other),
    }
}
