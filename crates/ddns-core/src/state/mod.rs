// # Observed State
//
// The most recently confirmed public addresses. Memory-only: it starts empty
// at process start, so the first cycle always reports every tracked family
// as changed and seeds all records.
//
// The engine's run loop is the single owner. Each cycle receives the current
// value and returns the replacement; nothing else writes it.

use std::net::IpAddr;

use crate::traits::AddressFamily;

/// Last confirmed address per family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservedState {
    pub ipv4: Option<IpAddr>,
    pub ipv6: Option<IpAddr>,
}

impl ObservedState {
    /// Create a state seeded with known addresses
    pub fn new(ipv4: Option<IpAddr>, ipv6: Option<IpAddr>) -> Self {
        Self { ipv4, ipv6 }
    }

    /// Address held for `family`
    pub fn get(&self, family: AddressFamily) -> Option<IpAddr> {
        match family {
            AddressFamily::V4 => self.ipv4,
            AddressFamily::V6 => self.ipv6,
        }
    }

    /// Every family holding an address, v4 first
    pub fn addresses(&self) -> impl Iterator<Item = (AddressFamily, IpAddr)> + use<> {
        let ipv4 = self.ipv4.map(|address| (AddressFamily::V4, address));
        let ipv6 = self.ipv6.map(|address| (AddressFamily::V6, address));
        ipv4.into_iter().chain(ipv6)
    }

    /// Whether no address has been confirmed yet
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_none() && self.ipv6.is_none()
    }
}

/// Which address families changed in the current cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IpChangeSet {
    pub ipv4: bool,
    pub ipv6: bool,
}

impl IpChangeSet {
    /// Whether any family changed
    pub fn any(&self) -> bool {
        self.ipv4 || self.ipv6
    }

    pub fn contains(&self, family: AddressFamily) -> bool {
        match family {
            AddressFamily::V4 => self.ipv4,
            AddressFamily::V6 => self.ipv6,
        }
    }

    /// Changed families, v4 first
    pub fn families(&self) -> impl Iterator<Item = AddressFamily> + use<> {
        let ipv4 = self.ipv4.then_some(AddressFamily::V4);
        let ipv6 = self.ipv6.then_some(AddressFamily::V6);
        ipv4.into_iter().chain(ipv6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state() {
        let state = ObservedState::default();
        assert!(state.is_empty());
        assert_eq!(state.get(AddressFamily::V4), None);
    }

    #[test]
    fn addresses_skip_empty_families() {
        let v4: IpAddr = "1.2.3.4".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();

        assert_eq!(
            ObservedState::new(Some(v4), Some(v6)).addresses().collect::<Vec<_>>(),
            vec![(AddressFamily::V4, v4), (AddressFamily::V6, v6)]
        );
        assert_eq!(
            ObservedState::new(Some(v4), None).addresses().collect::<Vec<_>>(),
            vec![(AddressFamily::V4, v4)]
        );
        assert_eq!(ObservedState::default().addresses().count(), 0);
    }

    #[test]
    fn families_in_order() {
        let both = IpChangeSet {
            ipv4: true,
            ipv6: true,
        };
        assert_eq!(
            both.families().collect::<Vec<_>>(),
            vec![AddressFamily::V4, AddressFamily::V6]
        );

        let only_v6 = IpChangeSet {
            ipv4: false,
            ipv6: true,
        };
        assert_eq!(only_v6.families().collect::<Vec<_>>(), vec![AddressFamily::V6]);
        assert!(only_v6.contains(AddressFamily::V6));
        assert!(!only_v6.contains(AddressFamily::V4));

        assert!(!IpChangeSet::default().any());
    }
}
