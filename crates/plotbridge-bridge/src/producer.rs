use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use bytes::Bytes;
use plotbridge_frame::{FrameConfig, FrameError, FrameReader, FrameWriter};
use plotbridge_protocol::{
    reconstruct, to_ne_bytes, Buffer, Element, ElementType, Header, Mode, EXIT, FINALIZE,
};
use plotbridge_transport::{BridgeSocket, SocketStream};
use tracing::debug;

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::error::{BridgeError, Result};

/// A value streamed back by the bridge after a successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnValue {
    pub symbol: String,
    /// Native-order bytes of the value.
    pub bytes: Bytes,
}

impl ReturnValue {
    /// Decode against the header the symbol was declared with.
    ///
    /// Text values may have changed length during evaluation, so only their
    /// element type is taken from the declaration.
    pub fn decode(&self, declared: &Header) -> plotbridge_protocol::Result<Buffer> {
        if declared.element_type.is_textual() {
            return reconstruct(&Header::text(&self.symbol, self.bytes.len()), &self.bytes);
        }
        reconstruct(declared, &self.bytes)
    }
}

/// Producer-side client: declares data, sends commands and collects return
/// values.
pub struct Producer {
    reader: FrameReader<SocketStream>,
    writer: FrameWriter<SocketStream>,
    declared_returns: BTreeMap<String, Header>,
}

impl Producer {
    /// Connect to a serving bridge.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_stream(BridgeSocket::connect(path)?, Self::default_frame_config())
    }

    /// Connect, retrying until `timeout` while the bridge comes up.
    pub fn connect_with_retry(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        Self::from_stream(
            BridgeSocket::connect_with_retry(path, timeout)?,
            Self::default_frame_config(),
        )
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: SocketStream, config: FrameConfig) -> Result<Self> {
        let writer = FrameWriter::for_socket(stream.try_clone()?, config.clone())?;
        let reader = FrameReader::for_socket(stream, config)?;
        Ok(Self {
            reader,
            writer,
            declared_returns: BTreeMap::new(),
        })
    }

    fn default_frame_config() -> FrameConfig {
        FrameConfig {
            read_timeout: Some(DEFAULT_POLL_INTERVAL),
            ..FrameConfig::default()
        }
    }

    /// Send the command text for the open cycle.
    pub fn send_command(&mut self, text: &str) -> Result<()> {
        if text.as_bytes() == FINALIZE || text.as_bytes() == EXIT || text.starts_with("data") {
            return Err(BridgeError::InvalidRequest(format!(
                "command text {text:?} would be read as a control or data frame"
            )));
        }
        self.writer.send(text.as_bytes())?;
        Ok(())
    }

    /// Send a header and its payload. The payload length must match the
    /// header.
    pub fn send_raw(&mut self, header: &Header, payload: &[u8]) -> Result<()> {
        if header.mode != Mode::Bind {
            return Err(BridgeError::InvalidRequest(format!(
                "'{}' is declared {}; use request_return",
                header.symbol,
                header.mode.as_str()
            )));
        }
        let expected = header.payload_len()?;
        if payload.len() != expected {
            return Err(BridgeError::InvalidRequest(format!(
                "payload for '{}' is {} bytes, header promises {expected}",
                header.symbol,
                payload.len()
            )));
        }
        self.writer.send(header.to_string().as_bytes())?;
        self.writer.send(payload)?;
        debug!(symbol = %header.symbol, bytes = payload.len(), "data sent");
        Ok(())
    }

    /// Send a row-major array. `shape` must be non-empty, start with a
    /// non-zero dimension and hold exactly `values.len()` elements.
    pub fn send_array<T: Element>(
        &mut self,
        symbol: &str,
        shape: &[usize],
        values: &[T],
    ) -> Result<()> {
        let product: usize = shape.iter().product();
        if shape.first().is_none_or(|&d| d == 0) || product != values.len() {
            return Err(BridgeError::InvalidRequest(format!(
                "shape {shape:?} does not hold {} values for '{symbol}'",
                values.len()
            )));
        }
        let header = Header::new(symbol, T::TYPE, shape.to_vec());
        self.send_raw(&header, &to_ne_bytes(values))
    }

    pub fn send_scalar<T: Element>(&mut self, symbol: &str, value: T) -> Result<()> {
        let header = Header::new(symbol, T::TYPE, Vec::new());
        self.send_raw(&header, &to_ne_bytes(&[value]))
    }

    pub fn send_text(&mut self, symbol: &str, text: &str) -> Result<()> {
        self.send_raw(&Header::text(symbol, text.len()), text.as_bytes())
    }

    /// Declare a symbol whose post-evaluation value should be sent back.
    /// The bridge binds a zeroed placeholder of this type and shape.
    pub fn request_return(
        &mut self,
        symbol: &str,
        element_type: ElementType,
        shape: &[usize],
    ) -> Result<()> {
        let header = if element_type.is_textual() {
            Header::text(symbol, shape.iter().product())
        } else {
            Header::new(symbol, element_type, shape.to_vec())
        }
        .with_mode(Mode::BindAndReturn);
        self.writer.send(header.to_string().as_bytes())?;
        self.declared_returns.insert(symbol.to_string(), header);
        Ok(())
    }

    /// Close the cycle; the bridge evaluates it.
    pub fn finalize(&mut self) -> Result<()> {
        self.writer.send(FINALIZE)?;
        Ok(())
    }

    /// Ask the bridge to stop.
    pub fn exit(&mut self) -> Result<()> {
        self.writer.send(EXIT)?;
        Ok(())
    }

    /// Header a return symbol was declared with.
    pub fn declared_return(&self, symbol: &str) -> Option<&Header> {
        self.declared_returns.get(symbol)
    }

    /// Wait up to `timeout` for the next `(symbol, value)` pair.
    pub fn recv_return(&mut self, timeout: Duration) -> Result<ReturnValue> {
        let deadline = Instant::now() + timeout;
        let name = self.recv_before(deadline, timeout)?;
        let symbol = std::str::from_utf8(&name)
            .map_err(|source| plotbridge_protocol::ProtocolError::InvalidUtf8 {
                context: "return symbol",
                source,
            })?
            .to_string();
        let bytes = self.recv_before(deadline, timeout)?;
        debug!(%symbol, bytes = bytes.len(), "return value received");
        Ok(ReturnValue { symbol, bytes })
    }

    fn recv_before(&mut self, deadline: Instant, timeout: Duration) -> Result<Bytes> {
        loop {
            if Instant::now() >= deadline {
                return Err(BridgeError::Timeout(timeout));
            }
            match self.reader.poll_frame() {
                Ok(Some(frame)) => return Ok(frame.into_payload()),
                Ok(None) => continue,
                Err(FrameError::ConnectionClosed) => {
                    return Err(BridgeError::Disconnected(
                        "bridge closed the connection".to_string(),
                    ))
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Close both directions of the connection.
    pub fn close(self) -> Result<()> {
        self.writer.get_ref().shutdown()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use plotbridge_protocol::{ArrayData, ProtocolRevision, Scalar};

    use super::*;

    fn pair() -> (Producer, FrameReader<SocketStream>, FrameWriter<SocketStream>) {
        let (ours, theirs) = SocketStream::pair().unwrap();
        let producer = Producer::from_stream(ours, Producer::default_frame_config()).unwrap();
        let writer = FrameWriter::new(theirs.try_clone().unwrap());
        let reader = FrameReader::new(theirs);
        (producer, reader, writer)
    }

    fn next_text(reader: &mut FrameReader<SocketStream>) -> String {
        String::from_utf8(reader.read_frame().unwrap().payload().to_vec()).unwrap()
    }

    #[test]
    fn cycle_frames_in_order() {
        let (mut producer, mut bridge, _) = pair();
        producer.send_command("y = x * 2").unwrap();
        producer.send_scalar("x", 5i32).unwrap();
        producer.request_return("y", ElementType::Int32, &[]).unwrap();
        producer.finalize().unwrap();

        assert_eq!(next_text(&mut bridge), "y = x * 2");
        assert_eq!(next_text(&mut bridge), "data|x|i|1|()|use");
        assert_eq!(bridge.read_frame().unwrap().payload(), 5i32.to_ne_bytes());
        assert_eq!(next_text(&mut bridge), "data|y|i|1|()|send_back");
        assert_eq!(next_text(&mut bridge), "finalize");
    }

    #[test]
    fn array_header_carries_shape() {
        let (mut producer, mut bridge, _) = pair();
        producer
            .send_array("m", &[2, 3], &[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();

        let header = Header::parse(&next_text(&mut bridge), ProtocolRevision::ReturnValues).unwrap();
        let payload = bridge.read_frame().unwrap();
        let Buffer::Array(array) = reconstruct(&header, payload.payload()).unwrap() else {
            panic!("expected array");
        };
        assert_eq!(array.shape(), &[2, 3]);
        assert_eq!(array.data(), &ArrayData::F64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    }

    #[test]
    fn text_is_sent_as_char_data() {
        let (mut producer, mut bridge, _) = pair();
        producer.send_text("title", "résumé").unwrap();
        assert_eq!(next_text(&mut bridge), "data|title|c|8|(8)|use");
        assert_eq!(next_text(&mut bridge), "résumé");
    }

    #[test]
    fn rejects_inconsistent_requests() {
        let (mut producer, _bridge, _) = pair();
        assert!(matches!(
            producer.send_array("x", &[2, 2], &[1i32, 2, 3]),
            Err(BridgeError::InvalidRequest(_))
        ));
        assert!(matches!(
            producer.send_array("x", &[], &[1i32]),
            Err(BridgeError::InvalidRequest(_))
        ));
        assert!(matches!(
            producer.send_command("finalize"),
            Err(BridgeError::InvalidRequest(_))
        ));
        assert!(matches!(
            producer.send_command("data = 3"),
            Err(BridgeError::InvalidRequest(_))
        ));
        let header = Header::new("y", ElementType::Int32, Vec::new()).with_mode(Mode::BindAndReturn);
        assert!(matches!(
            producer.send_raw(&header, &[0; 4]),
            Err(BridgeError::InvalidRequest(_))
        ));
    }

    #[test]
    fn recv_return_decodes_against_declaration() {
        let (mut producer, _bridge, mut back) = pair();
        producer
            .request_return("y", ElementType::Float32, &[2])
            .unwrap();

        back.send(b"y").unwrap();
        back.send(&to_ne_bytes(&[0.5f32, 1.5])).unwrap();

        let value = producer.recv_return(Duration::from_secs(2)).unwrap();
        assert_eq!(value.symbol, "y");
        let declared = producer.declared_return("y").unwrap();
        let Buffer::Array(array) = value.decode(declared).unwrap() else {
            panic!("expected array");
        };
        assert_eq!(array.data(), &ArrayData::F32(vec![0.5, 1.5]));
    }

    #[test]
    fn text_return_may_change_length() {
        let value = ReturnValue {
            symbol: "s".into(),
            bytes: Bytes::from_static(b"longer than declared"),
        };
        let declared = Header::text("s", 0).with_mode(Mode::BindAndReturn);
        assert_eq!(
            value.decode(&declared).unwrap(),
            Buffer::Text("longer than declared".into())
        );
    }

    #[test]
    fn scalar_return() {
        let value = ReturnValue {
            symbol: "k".into(),
            bytes: Bytes::copy_from_slice(&42u64.to_ne_bytes()),
        };
        let declared = Header::new("k", ElementType::UInt64, Vec::new());
        assert_eq!(value.decode(&declared).unwrap(), Buffer::Scalar(Scalar::U64(42)));
    }

    #[test]
    fn recv_return_times_out() {
        let (mut producer, _bridge, _back) = pair();
        let err = producer.recv_return(Duration::from_millis(80)).unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)));
    }

    #[test]
    fn recv_return_reports_disconnect() {
        let (mut producer, bridge, back) = pair();
        drop(bridge);
        drop(back);
        let err = producer.recv_return(Duration::from_secs(2)).unwrap_err();
        assert!(matches!(err, BridgeError::Disconnected(_)));
    }
}
