use bia_rs::bia::command::encode_frame;
use bia_rs::bia::frame::Frame;
use bia_rs::{decode_response, FrameAssembler};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn algorithm_frame() -> Vec<u8> {
    let mut payload = vec![0x01, 0x00];
    payload.resize(82, 0x2A);
    encode_frame(0xAA, 0xD2, &payload).unwrap()
}

fn mixed_stream() -> Vec<u8> {
    let mut stream = Vec::new();
    for _ in 0..32 {
        stream.extend_from_slice(&[0x00, 0xAA, 0x02, 0x13]);
        let status = [0x05, 0x03, 0x00, 0x96, 0x00, 0x58, 0x02, 0x00, 0x00];
        stream.extend(encode_frame(0xAA, 0xB1, &status).unwrap());
        stream.extend(algorithm_frame());
    }
    stream
}

fn benchmark_assembler(c: &mut Criterion) {
    let stream = mixed_stream();

    c.bench_function("assemble_stream", |b| {
        b.iter(|| {
            let mut assembler = FrameAssembler::new();
            black_box(assembler.push(black_box(&stream)))
        })
    });

    c.bench_function("assemble_bytewise", |b| {
        b.iter(|| {
            let mut assembler = FrameAssembler::new();
            let mut frames = 0;
            for byte in black_box(&stream).chunks(1) {
                frames += assembler.push(byte).len();
            }
            black_box(frames)
        })
    });
}

fn benchmark_decode_algorithm(c: &mut Criterion) {
    let frame = Frame::from_bytes(algorithm_frame()).unwrap();

    c.bench_function("decode_algorithm", |b| {
        b.iter(|| black_box(decode_response(black_box(&frame))))
    });
}

criterion_group!(benches, benchmark_assembler, benchmark_decode_algorithm);
criterion_main!(benches);
