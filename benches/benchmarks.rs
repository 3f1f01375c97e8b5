//! Performance benchmarks for the pollws protocol core.
//!
//! Run with: `cargo bench`

use bytes::BytesMut;
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use pollws::connection::OutgoingMessage;
use pollws::protocol::{
    Frame, FrameDecoder, HandshakeRequest, HandshakeResponse, MessageAssembler, OpCode, apply_mask,
    compute_accept_key,
};
use pollws::{Limits, Message};

const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];
const SIZES: [(&str, usize); 3] = [("10b", 10), ("1kb", 1024), ("64kb", 65536)];

// =============================================================================
// Frame Codec Benchmarks
// =============================================================================

fn server_frame(payload_size: usize) -> BytesMut {
    let mut buf = BytesMut::new();
    Frame::binary(vec![0xAB; payload_size]).encode(&mut buf, None);
    buf
}

fn bench_frame_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_codec");

    for (name, size) in SIZES {
        let wire = server_frame(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("parse_{name}"), |b| {
            b.iter(|| Frame::parse(black_box(&wire)))
        });

        let frame = Frame::binary(vec![0xAB; size]);
        group.bench_function(format!("encode_masked_{name}"), |b| {
            let mut out = BytesMut::with_capacity(frame.wire_size(true));
            b.iter(|| {
                out.clear();
                black_box(&frame).encode(&mut out, Some(MASK));
            })
        });
    }

    group.finish();
}

// =============================================================================
// Masking Benchmarks
// =============================================================================

fn bench_masking(c: &mut Criterion) {
    let mut group = c.benchmark_group("masking");

    for (name, size) in [("64b", 64), ("1kb", 1024), ("64kb", 65536), ("1mb", 1024 * 1024)] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("apply_mask_{name}"), |b| {
            let mut data = vec![0xAB; size];
            b.iter(|| apply_mask(black_box(&mut data), MASK))
        });
    }

    group.finish();
}

// =============================================================================
// Decoder Benchmarks
// =============================================================================

fn bench_decoder(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoder");

    let mut stream = BytesMut::new();
    for _ in 0..100 {
        Frame::text("a short chat message").encode(&mut stream, None);
    }
    group.throughput(Throughput::Bytes(stream.len() as u64));

    group.bench_function("100_small_frames_one_read", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new(Limits::default());
            decoder.extend(black_box(&stream));
            let mut count = 0;
            while let Some(frame) = decoder.decode().unwrap() {
                count += frame.payload().len();
            }
            count
        })
    });

    group.bench_function("100_small_frames_16b_reads", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new(Limits::default());
            let mut count = 0;
            for piece in black_box(&stream).chunks(16) {
                decoder.extend(piece);
                while let Some(frame) = decoder.decode().unwrap() {
                    count += frame.payload().len();
                }
            }
            count
        })
    });

    group.finish();
}

// =============================================================================
// Fragmentation and Reassembly Benchmarks
// =============================================================================

fn bench_fragmentation(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmentation");
    group.throughput(Throughput::Bytes(65536));

    let message = OutgoingMessage::from(Message::binary(vec![0xAB; 65536]));
    group.bench_function("fragment_64kb_into_4kb", |b| {
        b.iter(|| {
            let mut out = BytesMut::with_capacity(70_000);
            for piece in message.frames(black_box(4096)) {
                Frame::new(piece.fin, piece.opcode, piece.payload.to_vec())
                    .encode(&mut out, Some(MASK));
            }
            out
        })
    });

    group.bench_function("reassemble_single_frame_64kb", |b| {
        b.iter(|| {
            let mut assembler = MessageAssembler::new(Limits::default());
            assembler.push(Frame::binary(vec![0xAB; 65536])).unwrap()
        })
    });

    group.bench_function("reassemble_10_fragments_64kb", |b| {
        b.iter(|| {
            let mut assembler = MessageAssembler::new(Limits::default());
            for i in 0..9 {
                let opcode = if i == 0 {
                    OpCode::Binary
                } else {
                    OpCode::Continuation
                };
                assembler
                    .push(Frame::new(false, opcode, vec![0xAB; 6554]))
                    .unwrap();
            }
            assembler
                .push(Frame::new(true, OpCode::Continuation, vec![0xAB; 6554]))
                .unwrap()
        })
    });

    group.finish();
}

// =============================================================================
// Handshake Benchmarks
// =============================================================================

fn bench_handshake(c: &mut Criterion) {
    let mut group = c.benchmark_group("handshake");

    group.bench_function("compute_accept_key", |b| {
        b.iter(|| compute_accept_key(black_box("dGhlIHNhbXBsZSBub25jZQ==")))
    });

    group.bench_function("write_request", |b| {
        b.iter(|| {
            let request = HandshakeRequest::new("server.example.com", "/chat")
                .unwrap()
                .with_protocols(vec!["chat".into(), "superchat".into()]);
            let mut buf = Vec::with_capacity(256);
            request.write(&mut buf).unwrap();
            buf
        })
    });

    let response = b"HTTP/1.1 101 Switching Protocols\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
        Sec-WebSocket-Protocol: chat\r\n\
        \r\n";
    group.bench_function("parse_response", |b| {
        b.iter(|| HandshakeResponse::parse(black_box(response)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_codec,
    bench_masking,
    bench_decoder,
    bench_fragmentation,
    bench_handshake
);

criterion_main!(benches);
