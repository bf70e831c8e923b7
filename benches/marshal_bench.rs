use criterion::{Criterion, criterion_group, criterion_main};
use native_struct_module::fields;
use native_struct_module::{
    MarshalConfig, NativeMemory, ProcessMemory, ScalarType, StructInstance, StructSchema, compute_layout,
};
use std::hint::black_box;
use std::rc::Rc;
use std::sync::Arc;

// ─── Test Data ──────────────────────────────────────────────────────────────

/// A Vulkan-style create-info struct:
/// - scalars of every width, an enum and a string
/// - an inline fixed array and a dynamic array
/// - a `pNext`-style self pointer chain
fn create_info_schema() -> Arc<StructSchema> {
    let extent = StructSchema::builder("Extent")
        .field("width", fields::u32(0))
        .field("height", fields::u32(1))
        .field("depth", fields::u32(2))
        .build()
        .unwrap();

    StructSchema::builder("CreateInfo")
        .field("s_type", fields::enumeration(0, Default::default()))
        .field("p_next", fields::self_pointer(1))
        .field("flags", fields::u32(2))
        .field("name", fields::string(3))
        .field("extent", fields::inline_struct(4, &extent))
        .field("mip_levels", fields::u8(5))
        .field("scale", fields::f32(6))
        .field("clear", fields::fixed_array(7, ScalarType::F32, 4))
        .field("queue_families", fields::dynamic_array(8, ScalarType::U32))
        .field("callback", fields::function_pointer(9))
        .build()
        .unwrap()
}

fn memory() -> Rc<dyn NativeMemory> {
    // SAFETY: every address the benchmarks read back is one of their own
    // live buffers.
    Rc::new(unsafe { ProcessMemory::new() })
}

fn populated(schema: &Arc<StructSchema>, memory: &Rc<dyn NativeMemory>) -> StructInstance {
    let mut s = StructInstance::new(schema, memory.clone()).unwrap();
    s.set("s_type", 14u32).unwrap();
    s.set("flags", 0x10u32).unwrap();
    s.set("name", "swapchain image").unwrap();
    s.set("mip_levels", 4u8).unwrap();
    s.set("scale", 0.5f32).unwrap();
    s.set("clear", vec![0.1f32, 0.2, 0.3, 1.0]).unwrap();
    s.set("queue_families", vec![0u32, 2, 5]).unwrap();
    if let Some(extent) = s.get_mut("extent").unwrap().as_struct_mut() {
        extent.set("width", 1920u32).unwrap();
        extent.set("height", 1080u32).unwrap();
        extent.set("depth", 1u32).unwrap();
    }
    s
}

// ─── Layout ─────────────────────────────────────────────────────────────────

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let schema = create_info_schema();
    let config = MarshalConfig::default();

    group.bench_function("compute_layout", |b| {
        b.iter(|| compute_layout(black_box(&schema), false, &config).unwrap())
    });
    group.bench_function("compute_layout (overlay)", |b| {
        b.iter(|| compute_layout(black_box(&schema), true, &config).unwrap())
    });
    group.bench_function("StructInstance::new", |b| {
        let memory = memory();
        b.iter(|| StructInstance::new(black_box(&schema), memory.clone()).unwrap())
    });

    group.finish();
}

// ─── Flush / Read ───────────────────────────────────────────────────────────

fn bench_flush_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush_read");
    group.sample_size(500);
    let schema = create_info_schema();
    let memory = memory();

    group.bench_function("flush", |b| {
        let mut s = populated(&schema, &memory);
        b.iter(|| black_box(&mut s).flush().unwrap())
    });

    group.bench_function("flush (pointer chain)", |b| {
        let mut head = populated(&schema, &memory);
        head.set("p_next", populated(&schema, &memory)).unwrap();
        b.iter(|| black_box(&mut head).flush().unwrap())
    });

    group.bench_function("read", |b| {
        let mut s = populated(&schema, &memory);
        s.flush().unwrap();
        b.iter(|| black_box(&mut s).read().unwrap())
    });

    group.bench_function("flush + read", |b| {
        let mut s = populated(&schema, &memory);
        b.iter(|| {
            s.flush().unwrap();
            s.read().unwrap();
            black_box(s.size())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_layout, bench_flush_read);
criterion_main!(benches);
