/* Service layer. Persistence and the map-matching service are reached through
the ports declared here, so nothing below depends on a particular database or
HTTP client.
*/

pub mod conditions;
pub mod rides;
