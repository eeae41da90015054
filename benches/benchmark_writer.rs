use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ihex::{save_to_bytes, AddressVariant, Group, Section};

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = Group::new(AddressVariant::I16HEX);
    group
        .set_range(0x0001_2000, &[0x61, 0x64, 0x64, 0x72, 0x65, 0x73, 0x73, 0x20, 0x67, 0x61, 0x70])
        .unwrap();
    group.set_code_segment_and_instruction_pointer(0x0000, 0x3800).unwrap();
    group.push_section(Section::end_of_file()).unwrap();

    c.bench_function("save_to_bytes", |b| {
        b.iter(|| save_to_bytes(black_box(&group)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
