use crate::error::TraceError;

/// Ingress port number as supplied by the forwarding pipeline
pub type PortNumber = u32;

const WORD_BITS: usize = u64::BITS as usize;

/// Set of ports a client wants to observe
///
/// Covers the domain `[0, max_ports)`. Membership only ever grows: there is
/// no way to remove a port once added. "All ports" is kept as a flag so that
/// both `add_all` and `contains` stay O(1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortFilter {
    words: Vec<u64>,
    max_ports: usize,
    all: bool,
}

impl PortFilter {
    pub fn new(max_ports: usize) -> Self {
        Self {
            words: vec![0; max_ports.div_ceil(WORD_BITS)],
            max_ports,
            all: false,
        }
    }

    pub fn max_ports(&self) -> usize {
        self.max_ports
    }

    pub fn add(&mut self, port: PortNumber) -> Result<(), TraceError> {
        let index = port as usize;
        if index >= self.max_ports {
            return Err(TraceError::PortOutOfRange {
                port,
                max_ports: self.max_ports,
            });
        }
        self.words[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
        Ok(())
    }

    pub fn add_all(&mut self) {
        self.all = true;
    }

    pub fn contains(&self, port: PortNumber) -> bool {
        let index = port as usize;
        if index >= self.max_ports {
            return false;
        }
        self.all || self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    pub fn matches_all(&self) -> bool {
        self.all
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.words.iter().all(|w| *w == 0)
    }

    /// Number of ports in the set
    pub fn len(&self) -> usize {
        if self.all {
            return self.max_ports;
        }
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_filter_is_empty() {
        let filter = PortFilter::new(1024);
        assert!(filter.is_empty());
        assert_eq!(filter.len(), 0);
        for port in 0..1024 {
            assert!(!filter.contains(port));
        }
    }

    #[test]
    fn test_add_single_port() {
        let mut filter = PortFilter::new(1024);
        filter.add(5).unwrap();
        assert!(filter.contains(5));
        assert!(!filter.contains(4));
        assert!(!filter.contains(6));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_add_is_additive() {
        let mut filter = PortFilter::new(1024);
        filter.add(5).unwrap();
        filter.add(6).unwrap();
        filter.add(5).unwrap();
        assert!(filter.contains(5));
        assert!(filter.contains(6));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_word_boundaries() {
        let mut filter = PortFilter::new(1024);
        for port in [0, 63, 64, 127, 128, 1023] {
            filter.add(port).unwrap();
        }
        for port in [0, 63, 64, 127, 128, 1023] {
            assert!(filter.contains(port));
        }
        assert!(!filter.contains(62));
        assert!(!filter.contains(65));
        assert!(!filter.contains(1022));
    }

    #[test]
    fn test_add_out_of_range() {
        let mut filter = PortFilter::new(1024);
        assert!(matches!(
            filter.add(1024),
            Err(TraceError::PortOutOfRange {
                port: 1024,
                max_ports: 1024
            })
        ));
        assert!(filter.add(9999).is_err());
        assert!(filter.is_empty());
    }

    #[test]
    fn test_add_all_matches_every_port() {
        let mut filter = PortFilter::new(1024);
        filter.add_all();
        assert!(filter.matches_all());
        assert_eq!(filter.len(), 1024);
        for port in 0..1024 {
            assert!(filter.contains(port));
        }
        assert!(!filter.contains(1024));
    }

    #[test]
    fn test_non_multiple_of_word_size() {
        let mut filter = PortFilter::new(100);
        filter.add(99).unwrap();
        assert!(filter.contains(99));
        assert!(filter.add(100).is_err());
        assert!(!filter.contains(100));
    }
}
